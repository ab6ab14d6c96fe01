//! Conversion between serialized entities and records.
//!
//! Entities travel through `serde_json::Value`: the object produced by
//! serializing an entity is split into record properties, links and edge
//! endpoints according to its declared fields, and reassembled on read.
//! Embedded values are stored inline and tagged with their class under
//! [`CLASS_TAG`].

use serde_json::{Map, Value};

use crate::error::{OgmError, Result};
use crate::graph::{Direction, Record, Rid};
use crate::mapping::fields::{FieldKind, FieldSpec};
use crate::mapping::registry::{EntityMetadata, EntityRegistry};

/// Property holding the class name of an embedded value.
pub const CLASS_TAG: &str = "@class";

/// Builds a new record from a serialized entity. The identity field is skipped.
pub(crate) fn encode_record(
    metadata: &EntityMetadata,
    registry: &EntityRegistry,
    value: Value,
) -> Result<Record> {
    let kind = metadata.entity_type().element_kind().ok_or_else(|| {
        OgmError::mapping(format!(
            "embedded type {} cannot be stored on its own",
            metadata.name()
        ))
    })?;

    let Value::Object(object) = value else {
        return Err(OgmError::mapping(format!(
            "{} must serialize to an object",
            metadata.type_name()
        )));
    };

    let mut record = Record::new(metadata.name(), kind);
    for (name, value) in object {
        encode_field(metadata, registry, &mut record, &name, value)?;
    }
    Ok(record)
}

/// Writes one serialized field onto a record.
pub(crate) fn encode_field(
    metadata: &EntityMetadata,
    registry: &EntityRegistry,
    record: &mut Record,
    name: &str,
    value: Value,
) -> Result<()> {
    let Some(field) = metadata.field(name) else {
        record.set_property(name, value);
        return Ok(());
    };

    match &field.kind {
        FieldKind::Id => {}
        FieldKind::Embedded { .. } => {
            let tagged = tag_embedded(registry, field, value)?;
            record.set_property(name, tagged);
        }
        FieldKind::Link { .. } => record.set_link(name, parse_reference(metadata, field, value)?),
        FieldKind::FromVertex { .. } => {
            record.set_endpoint(Direction::Out, parse_reference(metadata, field, value)?)
        }
        FieldKind::ToVertex { .. } => {
            record.set_endpoint(Direction::In, parse_reference(metadata, field, value)?)
        }
    }
    Ok(())
}

/// Serialized form of one field, `None` when the record holds no value.
pub(crate) fn decode_field(metadata: &EntityMetadata, record: &Record, name: &str) -> Option<Value> {
    let Some(field) = metadata.field(name) else {
        return record.property(name).cloned();
    };

    match &field.kind {
        FieldKind::Id => record.rid().map(|rid| Value::String(rid.to_string())),
        FieldKind::Embedded { .. } => record.property(name).cloned().map(strip_tags),
        FieldKind::Link { .. } => Some(reference(record.link(name))),
        FieldKind::FromVertex { .. } => Some(reference(record.endpoint(Direction::Out))),
        FieldKind::ToVertex { .. } => Some(reference(record.endpoint(Direction::In))),
    }
}

/// Reassembles the serialized entity. The identity field is set to `id`.
pub(crate) fn decode_record(metadata: &EntityMetadata, record: &Record, id: Value) -> Value {
    let mut object = Map::new();
    for name in field_names(metadata, record) {
        if let Some(value) = decode_field(metadata, record, &name) {
            object.insert(name, value);
        }
    }
    if let Some(id_field) = metadata.id_field() {
        object.insert(id_field.to_string(), id);
    }
    Value::Object(object)
}

/// Every field name present on the record or declared on the type.
pub(crate) fn field_names(metadata: &EntityMetadata, record: &Record) -> Vec<String> {
    let mut names: Vec<String> = record.properties().keys().cloned().collect();
    for field in metadata.fields() {
        if field.kind != FieldKind::Id && !names.contains(&field.name) {
            names.push(field.name.clone());
        }
    }
    names
}

fn reference(rid: Option<Rid>) -> Value {
    rid.map(|rid| Value::String(rid.to_string()))
        .unwrap_or(Value::Null)
}

fn parse_reference(metadata: &EntityMetadata, field: &FieldSpec, value: Value) -> Result<Option<Rid>> {
    serde_json::from_value(value).map_err(|e| {
        OgmError::mapping(format!(
            "{}.{} is not a record reference: {}",
            metadata.name(),
            field.name,
            e
        ))
    })
}

pub(crate) fn tag_embedded(registry: &EntityRegistry, field: &FieldSpec, value: Value) -> Result<Value> {
    let Some(target) = field.target().and_then(|t| registry.by_type_id(t.id)) else {
        return Err(OgmError::mapping(format!(
            "embedded field '{}' has no registered type",
            field.name
        )));
    };

    match value {
        Value::Null => Ok(Value::Null),
        Value::Array(items) => items
            .into_iter()
            .map(|item| tag_embedded(registry, field, item))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(object) => {
            let mut tagged = Map::new();
            for (name, value) in object {
                let value = match target.field(&name) {
                    Some(nested) => tag_embedded(registry, nested, value)?,
                    None => value,
                };
                tagged.insert(name, value);
            }
            tagged.insert(CLASS_TAG.to_string(), Value::String(target.name().to_string()));
            Ok(Value::Object(tagged))
        }
        other => Err(OgmError::mapping(format!(
            "embedded field '{}' must hold an object, found {}",
            field.name, other
        ))),
    }
}

pub(crate) fn strip_tags(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(strip_tags).collect()),
        Value::Object(object) => Value::Object(
            object
                .into_iter()
                .filter(|(name, _)| name != CLASS_TAG)
                .map(|(name, value)| (name, strip_tags(value)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ElementKind;
    use crate::mapping::entity_type::EntityMarker;
    use crate::mapping::fields::Link;
    use crate::mapping::registry::Entity;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Serialize, Deserialize)]
    struct Geo {
        lat: f64,
    }

    impl Entity for Geo {
        fn markers() -> Vec<EntityMarker> {
            vec![EntityMarker::embedded()]
        }
    }

    #[derive(Serialize, Deserialize)]
    struct Address {
        city: String,
        geo: Option<Geo>,
    }

    impl Entity for Address {
        fn markers() -> Vec<EntityMarker> {
            vec![EntityMarker::embedded()]
        }

        fn fields() -> Vec<FieldSpec> {
            vec![FieldSpec::embedded::<Geo>("geo")]
        }
    }

    #[derive(Serialize, Deserialize)]
    struct Company {
        name: String,
    }

    impl Entity for Company {
        fn markers() -> Vec<EntityMarker> {
            vec![EntityMarker::vertex()]
        }
    }

    #[derive(Serialize, Deserialize)]
    struct Person {
        id: Option<Rid>,
        name: String,
        addresses: Vec<Address>,
        employer: Link<Company>,
    }

    impl Entity for Person {
        fn markers() -> Vec<EntityMarker> {
            vec![EntityMarker::vertex()]
        }

        fn fields() -> Vec<FieldSpec> {
            vec![
                FieldSpec::id("id"),
                FieldSpec::embedded::<Address>("addresses"),
                FieldSpec::link::<Company>("employer"),
            ]
        }
    }

    #[derive(Serialize, Deserialize)]
    struct WorksAt {
        since: u32,
        person: Link<Person>,
        company: Link<Company>,
    }

    impl Entity for WorksAt {
        fn markers() -> Vec<EntityMarker> {
            vec![EntityMarker::edge()]
        }

        fn fields() -> Vec<FieldSpec> {
            vec![
                FieldSpec::from_vertex::<Person>("person"),
                FieldSpec::to_vertex::<Company>("company"),
            ]
        }
    }

    fn registry() -> EntityRegistry {
        EntityRegistry::builder()
            .register::<Geo>()
            .register::<Address>()
            .register::<Company>()
            .register::<Person>()
            .register::<WorksAt>()
            .build()
            .unwrap()
    }

    fn person() -> Value {
        json!({
            "id": null,
            "name": "Ada",
            "addresses": [{"city": "X", "geo": {"lat": 1.5}}],
            "employer": "#4:0",
        })
    }

    #[test]
    fn test_encode_record_splits_fields() {
        let registry = registry();
        let metadata = registry.metadata::<Person>().unwrap();

        let record = encode_record(&metadata, &registry, person()).unwrap();

        assert_eq!(record.class(), "Person");
        assert_eq!(record.kind(), ElementKind::Vertex);
        assert!(record.property("id").is_none());
        assert_eq!(record.property("name"), Some(&json!("Ada")));
        assert_eq!(record.link("employer"), Some(Rid::new(4, 0)));
        assert_eq!(
            record.property("addresses"),
            Some(&json!([{"city": "X", "geo": {"lat": 1.5, "@class": "Geo"}, "@class": "Address"}]))
        );
    }

    #[test]
    fn test_encode_edge_endpoints() {
        let registry = registry();
        let metadata = registry.metadata::<WorksAt>().unwrap();

        let record = encode_record(
            &metadata,
            &registry,
            json!({"since": 2020, "person": "#5:1", "company": "#4:0"}),
        )
        .unwrap();

        assert_eq!(record.kind(), ElementKind::Edge);
        assert_eq!(record.endpoint(Direction::Out), Some(Rid::new(5, 1)));
        assert_eq!(record.endpoint(Direction::In), Some(Rid::new(4, 0)));
        assert!(record.property("person").is_none());
    }

    #[test]
    fn test_decode_record_restores_entity() {
        let registry = registry();
        let metadata = registry.metadata::<Person>().unwrap();
        let record = encode_record(&metadata, &registry, person()).unwrap();

        let decoded = decode_record(&metadata, &record, json!("#5:1"));
        let mut expected = person();
        expected["id"] = json!("#5:1");
        assert_eq!(decoded, expected);
    }

    #[test]
    fn test_decode_unset_link_is_null() {
        let registry = registry();
        let metadata = registry.metadata::<Person>().unwrap();
        let mut value = person();
        value["employer"] = Value::Null;

        let record = encode_record(&metadata, &registry, value).unwrap();
        assert_eq!(decode_field(&metadata, &record, "employer"), Some(Value::Null));
        assert_eq!(decode_field(&metadata, &record, "missing"), None);
    }

    #[test]
    fn test_encode_rejects_non_object_embedded() {
        let registry = registry();
        let metadata = registry.metadata::<Person>().unwrap();
        let mut value = person();
        value["addresses"] = json!(["X"]);

        let err = encode_record(&metadata, &registry, value).unwrap_err();
        assert!(matches!(err, OgmError::Mapping(_)));
    }

    #[test]
    fn test_encode_rejects_malformed_link() {
        let registry = registry();
        let metadata = registry.metadata::<Person>().unwrap();
        let mut value = person();
        value["employer"] = json!(42);

        let err = encode_record(&metadata, &registry, value).unwrap_err();
        assert!(err.to_string().contains("Person.employer"));
    }

    #[test]
    fn test_embedded_type_cannot_be_a_record() {
        let registry = registry();
        let metadata = registry.metadata::<Address>().unwrap();

        let err = encode_record(&metadata, &registry, json!({"city": "X"})).unwrap_err();
        assert!(err.to_string().contains("cannot be stored on its own"));
    }
}
