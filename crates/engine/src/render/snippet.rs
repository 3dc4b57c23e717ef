//! Host-server integration snippet.
//!
//! For hosts that wire plugins by hand instead of through the registrar:
//! a Python fragment that imports the generated plugin, adds it to the
//! host's `APPS` table and mounts its routes.

use super::code::CodeWriter;
use super::ident::quote;
use super::PreparedWorkflow;

pub fn render(wf: &PreparedWorkflow<'_>) -> String {
    let schema = wf.schema;
    let var = format!("{}_plugin", wf.module);
    let mut w = CodeWriter::new("    ");

    w.line(format!("# Integration for {}", schema.name.replace('\n', " ")));
    w.line("import importlib");
    w.blank();
    w.line(format!(
        "{var} = importlib.import_module({}).plugin_instance",
        quote(&format!("{}_plugin", schema.id))
    ));
    w.blank();
    w.block(format!("APPS[{}] = {{", quote(&schema.id)), Some("}"), |w| {
        w.line(format!("\"id\": {},", quote(&schema.id)));
        w.line(format!("\"name\": {},", quote(&schema.name)));
        w.line(format!("\"description\": {},", quote(&schema.description)));
        w.line(format!("\"category\": {},", quote(&schema.category)));
        w.line(format!("\"plugin\": {var},"));
        w.block("\"steps\": [", Some("],"), |w| {
            for step in &wf.steps {
                w.line(format!(
                    "{{\"id\": {}, \"name\": {}, \"description\": {}}},",
                    quote(&step.handler),
                    quote(&step.step.name),
                    quote(&step.step.description)
                ));
            }
        });
    });
    w.blank();
    w.blank();
    w.block(format!("async def register_{}_routes():", wf.module), None, |w| {
        w.block(format!("for route in {var}.get_api_routes():"), None, |w| {
            w.block("app.add_api_route(", Some(")"), |w| {
                w.line("path=route[\"path\"],");
                w.line("endpoint=route[\"handler\"],");
                w.line("methods=[route[\"method\"]],");
                w.line("response_model=route[\"response_model\"],");
            });
        });
    });
    w.finish()
}
