use schemars::{gen::SchemaGenerator, schema::Schema, JsonSchema};
use serde::{Deserialize, Deserializer};

/// Deserializes an explicit `null` as the default value, so optional enum fields such as
/// `serviceType` need not be `Option`s.
pub(crate) fn null_to_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::deserialize(d)?.unwrap_or_default())
}

/// The schema of the enum `T`, marked nullable and with `"null"` added to its allowed values.
/// OpenAPI only accepts null for a [nullable enum] when it is listed.
///
/// [nullable enum]: https://swagger.io/docs/specification/data-models/enums
pub(crate) fn nullable_enum<T>(g: &mut SchemaGenerator) -> Schema
where
    T: JsonSchema,
{
    let mut schema = match T::json_schema(g) {
        Schema::Bool(x) => return Schema::Bool(x),
        Schema::Object(schema_object) => schema_object,
    };
    if let Some(enum_values) = &mut schema.enum_values {
        enum_values.push(serde_json::Value::String("null".to_owned()))
    }
    schema
        .extensions
        .insert("nullable".to_owned(), serde_json::Value::Bool(true));
    schema.into()
}
