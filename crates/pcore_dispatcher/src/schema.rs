//! Input/output schema validation (§4.7 steps 4 and 6), grounded on
//! the `jsonschema` usage pattern from the example pack's plugin
//! manifest validator: compile the schema, validate the instance,
//! join every validation error into one message.

use jsonschema::JSONSchema;
use serde_json::Value;

/// Compile `schema` and validate `instance` against it. Returns the
/// joined validation error messages on failure; a schema that itself
/// fails to compile is reported the same way, since either way the
/// handler's declared schema can't vouch for this payload.
pub fn validate(schema: &Value, instance: &Value) -> Result<(), String> {
    let compiled = JSONSchema::compile(schema).map_err(|e| format!("invalid schema: {e}"))?;
    let result = compiled.validate(instance);
    if let Err(errors) = result {
        let message = errors.map(|e| e.to_string()).collect::<Vec<_>>().join(", ");
        return Err(message);
    }
    Ok(())
}
