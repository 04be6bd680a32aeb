//! Variable inspection handlers: flat listing of debugger-visible globals
//! and rich (multi-format) representation retrieval for one of them.

use crate::bridge::filter::VariableFilter;
use crate::interpreter::{Interpreter, InterpreterHandle};
use crate::protocol::{Request, Response};
use crate::transport::AdapterTransport;
use anyhow::anyhow;
use log::warn;
use serde_json::{json, Map, Value};

const REPR_DATA_SUFFIX: &str = "_repr_data";
// Truncated historically; kept as-is for wire compatibility with front ends
// that read the temporaries back themselves.
const REPR_METADATA_SUFFIX: &str = "_repr_metada";

/// Handler for `inspectVariables`.
pub struct VariableInspector {
    interpreter: InterpreterHandle,
    filter: VariableFilter,
}

impl VariableInspector {
    pub fn new(interpreter: InterpreterHandle, filter: VariableFilter) -> Self {
        Self {
            interpreter,
            filter,
        }
    }

    /// Build the listing of debugger-visible globals. Blocking: takes the
    /// interpreter lock for the duration of the enumeration.
    ///
    /// Always `success: true`; a value whose serialization fails degrades to
    /// its textual repr instead of failing the request.
    pub fn inspect(&self, request: &Request) -> Response {
        let interpreter = self.interpreter.lock();
        let mut variables = Vec::new();
        for name in interpreter.global_names() {
            if !self.filter.keep(&name) {
                continue;
            }
            let Some(value) = interpreter.global(&name) else {
                continue;
            };
            let rendered = value.json.unwrap_or_else(|| Value::String(value.repr));
            variables.push(json!({
                "name": name,
                "value": rendered,
                "type": value.type_name,
                "variablesReference": 0,
            }));
        }
        Response::success(request, json!({ "variables": variables }))
    }
}

/// Handler for `richInspectVariables`.
pub struct RichInspector {
    interpreter: InterpreterHandle,
}

impl RichInspector {
    pub fn new(interpreter: InterpreterHandle) -> Self {
        Self { interpreter }
    }

    /// Retrieve the multi-format rendering of one named global. Blocking:
    /// when execution is suspended at a breakpoint this performs a full
    /// round trip to the adapter before reading the result back.
    pub fn rich_inspect(&self, request: &Request, transport: &mut dyn AdapterTransport) -> Response {
        match self.try_rich_inspect(request, transport) {
            Ok(body) => Response::success(request, body),
            Err(err) => {
                warn!(target: "dapbridge", "rich inspection failed: {err:#}");
                Response::failure(request)
            }
        }
    }

    fn try_rich_inspect(
        &self,
        request: &Request,
        transport: &mut dyn AdapterTransport,
    ) -> anyhow::Result<Value> {
        let var_name = request
            .arguments
            .get("variableName")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("missing variableName argument"))?;
        let repr_data = format!("{var_name}{REPR_DATA_SUFFIX}");
        let repr_metadata = format!("{var_name}{REPR_METADATA_SUFFIX}");

        if transport.stopped_threads().is_empty() {
            // No breakpoint hit: render directly on the live interpreter.
            let code = format!(
                "from IPython import get_ipython;{repr_data},{repr_metadata} = \
                 get_ipython().display_formatter.format({var_name})"
            );
            let mut interpreter = self.interpreter.lock();
            interpreter
                .execute(&code)
                .map_err(|err| anyhow!("rendering failed: {}: {}", err.ename, err.evalue))?;
        } else {
            // Execution is suspended, direct execution is unavailable: ask
            // the adapter to evaluate the rendering in the paused frame.
            let frame_id = request
                .arguments
                .get("frameId")
                .and_then(Value::as_i64)
                .ok_or_else(|| anyhow!("missing frameId argument"))?;
            let forwarded = Request::forwarded(
                request,
                "setExpression",
                json!({
                    "expression": format!("{repr_data},{repr_metadata}"),
                    "value": format!("get_ipython().display_formatter.format({var_name})"),
                    "frameId": frame_id,
                }),
            );
            // The round trip must complete before the read-back below: the
            // temporaries do not exist until the adapter executed the
            // assignment.
            transport.forward(&forwarded)?;
        }

        let interpreter = self.interpreter.lock();
        let data = read_mapping(&**interpreter, &repr_data)?;
        let metadata = read_mapping(&**interpreter, &repr_metadata)?;

        let mut body_data = Map::new();
        let mut body_metadata = Map::new();
        for (key, value) in data {
            if let Some(meta) = metadata.get(&key) {
                body_metadata.insert(key.clone(), meta.clone());
            }
            body_data.insert(key, value);
        }
        Ok(json!({ "data": body_data, "metadata": body_metadata }))
    }
}

fn read_mapping(interpreter: &dyn Interpreter, name: &str) -> anyhow::Result<Map<String, Value>> {
    let value = interpreter
        .global(name)
        .ok_or_else(|| anyhow!("temporary `{name}` not found"))?;
    match value.json {
        Some(Value::Object(map)) => Ok(map),
        _ => Err(anyhow!("temporary `{name}` is not a mapping")),
    }
}
