use serde::Serialize;

use crate::error::SerializationError;

/// Turns outbound records into payload bytes. `None` stands for an absent
/// record (a tombstone) and serializes to no payload.
pub trait RecordSerializer<T: ?Sized> {
    fn serialize(
        &self,
        topic: &str,
        data: Option<&T>,
    ) -> Result<Option<Vec<u8>>, SerializationError>;
}

/// Serializes records as compact JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl<T: Serialize + ?Sized> RecordSerializer<T> for JsonSerializer {
    fn serialize(
        &self,
        topic: &str,
        data: Option<&T>,
    ) -> Result<Option<Vec<u8>>, SerializationError> {
        let Some(data) = data else {
            return Ok(None);
        };

        serde_json::to_vec(data)
            .map(Some)
            .map_err(|source| SerializationError::Json {
                topic: topic.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::Serializer;
    use serde_json::json;

    use super::*;

    #[derive(Serialize)]
    struct Event {
        uuid: &'static str,
        event: &'static str,
        properties: BTreeMap<&'static str, i64>,
    }

    #[test]
    fn test_absent_record_has_no_payload() {
        let serializer = JsonSerializer;
        let absent: Option<&serde_json::Value> = None;

        let payload = serializer.serialize("events", absent).unwrap();
        assert_eq!(payload, None);
    }

    #[test]
    fn test_json_object_payload() {
        let serializer = JsonSerializer;
        let value = json!({"event": "$pageview", "count": 3});

        let payload = serializer.serialize("events", Some(&value)).unwrap();
        assert_eq!(
            payload.as_deref(),
            Some(br#"{"count":3,"event":"$pageview"}"#.as_slice())
        );
    }

    #[test]
    fn test_struct_payload() {
        let serializer = JsonSerializer;
        let event = Event {
            uuid: "0190a5a4-0000-7000-8000-000000000000",
            event: "$identify",
            properties: BTreeMap::from([("a", 1), ("b", 2)]),
        };

        let payload = serializer.serialize("events", Some(&event)).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&payload.unwrap()).unwrap();
        assert_eq!(
            parsed,
            json!({
                "uuid": "0190a5a4-0000-7000-8000-000000000000",
                "event": "$identify",
                "properties": {"a": 1, "b": 2}
            })
        );
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("refusing to serialize"))
        }
    }

    #[test]
    fn test_serialization_failure_names_topic() {
        let serializer = JsonSerializer;
        let err = serializer
            .serialize("events", Some(&Unserializable))
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "failed to serialize record for topic events"
        );
        let SerializationError::Json { topic, source } = err;
        assert_eq!(topic, "events");
        assert!(source.to_string().contains("refusing to serialize"));
    }
}
