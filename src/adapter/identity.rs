//! Works out which player a host value belongs to.

use std::collections::HashSet;

use uuid::Uuid;

use crate::host::{OpKind, TypeRef, Value};

/// How far into an object graph we look for a UUID.
const MAX_DEPTH: usize = 4;

/// Accessor names that commonly return a player's UUID.
const UUID_ACCESSORS: [&str; 5] = ["id", "getId", "uuid", "getUuid", "getUUID"];

/// Parses a UUID in the hyphenated or the 32-digit simple form. Blank strings give `None`.
pub fn parse_uuid(raw: &str) -> Option<Uuid> {
    let raw = raw.trim();

    if raw.is_empty() {
        return None;
    }

    Uuid::parse_str(raw).ok()
}

/// Searches `value` for a UUID: the value itself, then well-known accessors, then any
/// zero-argument method returning a UUID, then recursively through zero-argument methods that
/// return other objects.
pub fn extract_uuid(value: &Value) -> Option<Uuid> {
    extract(value, &mut HashSet::new(), 0)
}

fn extract(value: &Value, seen: &mut HashSet<usize>, depth: usize) -> Option<Uuid> {
    let object = match value {
        Value::Uuid(uuid) => return Some(*uuid),
        Value::Object(object) => object,
        _ => return None,
    };

    if depth > MAX_DEPTH || !seen.insert(object.address()) {
        return None;
    }

    let class = object.class();

    let getters = || {
        class
            .methods()
            .iter()
            .filter(|method| method.kind() == OpKind::Instance && method.params().is_empty())
    };

    for name in UUID_ACCESSORS {
        let found = class
            .methods_named(name)
            .filter(|method| method.kind() == OpKind::Instance && method.params().is_empty())
            .find_map(|method| match method.invoke(Some(value), &[]) {
                Ok(Value::Uuid(uuid)) => Some(uuid),
                _ => None,
            });

        if found.is_some() {
            return found;
        }
    }

    for method in getters() {
        match method.returns() {
            Some(TypeRef::Uuid) => {
                if let Ok(Value::Uuid(uuid)) = method.invoke(Some(value), &[]) {
                    return Some(uuid);
                }
            }

            Some(TypeRef::Class(_) | TypeRef::SelfType) => {
                let Ok(nested) = method.invoke(Some(value), &[]) else {
                    continue;
                };

                if let Some(uuid) = extract(&nested, seen, depth + 1) {
                    return Some(uuid);
                }
            }

            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{fixture::FakeHost, HostClass, ObjectRef};

    const STEVE: &str = "8667ba71-b85a-4004-af54-457a9734eed7";

    #[test]
    fn parses_both_uuid_forms() {
        let dashed = parse_uuid(STEVE).unwrap();
        let simple = parse_uuid("8667ba71b85a4004af54457a9734eed7").unwrap();

        assert_eq!(dashed, simple);
        assert_eq!(parse_uuid("  "), None);
        assert_eq!(parse_uuid("steve"), None);
    }

    #[test]
    fn finds_uuid_through_nested_objects() {
        let host = FakeHost::new();
        let uuid = parse_uuid(STEVE).unwrap();

        assert_eq!(extract_uuid(&host.player_with(uuid)), Some(uuid));
        assert_eq!(extract_uuid(&Value::str(STEVE)), None);
    }

    #[test]
    fn stops_at_cycles() {
        let node = HostClass::builder("Node")
            .method("next", vec![], Some(TypeRef::SelfType), |target, _| {
                Ok(target.clone())
            })
            .build();

        let value = Value::Object(ObjectRef::new(&node, ()));
        assert_eq!(extract_uuid(&value), None);
    }
}
