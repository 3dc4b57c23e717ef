//! The parameter type table.
//!
//! Every place that needs to know how an abstract [`ParameterType`] looks in
//! Python, in TypeScript, or on screen reads it from [`type_mapping`]. The
//! match is exhaustive, so a new type cannot be added without deciding all
//! of it at once.

use serde_json::Value;

use crate::models::ParameterType;

/// Which input the frontend renders for a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Widget {
    /// `<Input type=...>`.
    Input { input_type: &'static str },
    Checkbox,
    Select,
    MultiSelect,
    FileUpload,
    TextArea,
    /// A `TextArea` whose text is parsed as JSON.
    JsonEditor,
}

/// Initial frontend state when the parameter has no default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialValue {
    EmptyString,
    Zero,
    False,
    Null,
    EmptyArray,
    EmptyObject,
    FirstOption,
}

/// What `min`/`max` rules bound for this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bounds {
    Value,
    Length,
    Unsupported,
}

/// JSON shape a non-null default must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultKind {
    Text,
    Number,
    Bool,
    Object,
    /// Checked against the option list instead.
    Choice,
    /// The type takes no default.
    Forbidden,
}

impl DefaultKind {
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Text      => value.is_string(),
            Self::Number    => value.is_number(),
            Self::Bool      => value.is_boolean(),
            Self::Object    => value.is_object(),
            Self::Choice    => true,
            Self::Forbidden => false,
        }
    }
}

/// How one abstract type is expressed in every target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMapping {
    /// Python annotation; `{choices}` is replaced by the option literal list.
    pub python: &'static str,
    /// TypeScript type; `{choices}` is replaced by the option union.
    pub typescript: &'static str,
    pub widget: Widget,
    pub initial: InitialValue,
    pub bounds: Bounds,
    /// Whether a `pattern` rule can be enforced.
    pub pattern: bool,
    pub default: DefaultKind,
}

pub fn type_mapping(ty: ParameterType) -> TypeMapping {
    use ParameterType as P;
    match ty {
        P::String => TypeMapping {
            python: "str",
            typescript: "string",
            widget: Widget::Input { input_type: "text" },
            initial: InitialValue::EmptyString,
            bounds: Bounds::Length,
            pattern: true,
            default: DefaultKind::Text,
        },
        P::Number => TypeMapping {
            python: "float",
            typescript: "number",
            widget: Widget::Input { input_type: "number" },
            initial: InitialValue::Zero,
            bounds: Bounds::Value,
            pattern: false,
            default: DefaultKind::Number,
        },
        P::Boolean => TypeMapping {
            python: "bool",
            typescript: "boolean",
            widget: Widget::Checkbox,
            initial: InitialValue::False,
            bounds: Bounds::Unsupported,
            pattern: false,
            default: DefaultKind::Bool,
        },
        P::File => TypeMapping {
            python: "bytes",
            typescript: "File | null",
            widget: Widget::FileUpload,
            initial: InitialValue::Null,
            bounds: Bounds::Unsupported,
            pattern: false,
            default: DefaultKind::Forbidden,
        },
        P::Select => TypeMapping {
            python: "Literal[{choices}]",
            typescript: "{choices}",
            widget: Widget::Select,
            initial: InitialValue::FirstOption,
            bounds: Bounds::Unsupported,
            pattern: false,
            default: DefaultKind::Choice,
        },
        P::Multiselect => TypeMapping {
            python: "List[Literal[{choices}]]",
            typescript: "Array<{choices}>",
            widget: Widget::MultiSelect,
            initial: InitialValue::EmptyArray,
            bounds: Bounds::Length,
            pattern: false,
            default: DefaultKind::Choice,
        },
        P::TextArea => TypeMapping {
            python: "str",
            typescript: "string",
            widget: Widget::TextArea,
            initial: InitialValue::EmptyString,
            bounds: Bounds::Length,
            pattern: true,
            default: DefaultKind::Text,
        },
        P::Json => TypeMapping {
            python: "Dict[str, Any]",
            typescript: "Record<string, unknown>",
            widget: Widget::JsonEditor,
            initial: InitialValue::EmptyObject,
            bounds: Bounds::Unsupported,
            pattern: false,
            default: DefaultKind::Object,
        },
        P::Date => TypeMapping {
            python: "date",
            typescript: "string",
            widget: Widget::Input { input_type: "date" },
            initial: InitialValue::EmptyString,
            bounds: Bounds::Unsupported,
            pattern: false,
            default: DefaultKind::Text,
        },
        P::Url => TypeMapping {
            python: "HttpUrl",
            typescript: "string",
            widget: Widget::Input { input_type: "url" },
            initial: InitialValue::EmptyString,
            bounds: Bounds::Unsupported,
            pattern: false,
            default: DefaultKind::Text,
        },
        P::Email => TypeMapping {
            python: "EmailStr",
            typescript: "string",
            widget: Widget::Input { input_type: "email" },
            initial: InitialValue::EmptyString,
            bounds: Bounds::Unsupported,
            pattern: false,
            default: DefaultKind::Text,
        },
    }
}
