//! Conflict detection: three-way diff against the nearest common ancestor.

use serde_json::Value;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::store::{ArtifactStore, VersionedArtifact};

use super::types::{
    ArtifactConflict, ConflictRegion, ConflictSeverity, ConflictType, RegionKind,
};

/// Check two versions of the same path for divergence. Returns `None` when
/// one version is a strict descendant of the other (no conflict — ordinary
/// history), otherwise a classified conflict.
pub fn detect(
    store: &ArtifactStore,
    current_id: &str,
    incoming_id: &str,
) -> EngineResult<Option<ArtifactConflict>> {
    let current = store
        .get(current_id)
        .ok_or_else(|| EngineError::ArtifactNotFound(current_id.to_string()))?;
    let incoming = store
        .get(incoming_id)
        .ok_or_else(|| EngineError::ArtifactNotFound(incoming_id.to_string()))?;

    if current.path != incoming.path {
        return Err(EngineError::InternalError(format!(
            "conflict detection across paths: '{}' vs '{}'",
            current.path, incoming.path
        )));
    }

    if current_id == incoming_id
        || store.is_descendant(current_id, incoming_id)
        || store.is_descendant(incoming_id, current_id)
    {
        return Ok(None);
    }

    let base = store.common_ancestor(current_id, incoming_id);
    let regions = diff_regions(
        base.map(|b| &b.content),
        &current.content,
        &incoming.content,
        &current.path,
    );
    let severity = classify(current, incoming, &regions);
    let conflict_type = if current.content.is_object() != incoming.content.is_object() {
        ConflictType::SchemaConflict
    } else {
        ConflictType::ConcurrentWrite
    };

    tracing::debug!(
        path = %current.path,
        regions = regions.len(),
        ?severity,
        "artifact conflict detected"
    );

    Ok(Some(ArtifactConflict {
        id: Uuid::new_v4().to_string(),
        artifact_path: current.path.clone(),
        conflict_type,
        severity,
        current_version: current.id.clone(),
        incoming_version: incoming.id.clone(),
        regions,
        resolution: None,
    }))
}

/// Three-way diff. Structured content diffs per top-level field; opaque
/// content produces a single whole-content region. Identical content with
/// divergent history yields zero regions (metadata-only).
fn diff_regions(
    base: Option<&Value>,
    current: &Value,
    incoming: &Value,
    path: &str,
) -> Vec<ConflictRegion> {
    if current == incoming {
        return vec![];
    }

    if let (Some(cur_obj), Some(inc_obj)) = (current.as_object(), incoming.as_object()) {
        let base_obj = base.and_then(Value::as_object);
        let mut keys: Vec<&String> = cur_obj.keys().chain(inc_obj.keys()).collect();
        keys.sort();
        keys.dedup();

        let mut regions = Vec::new();
        for key in keys {
            let c = cur_obj.get(key);
            let i = inc_obj.get(key);
            if c == i {
                continue;
            }
            let b = base_obj.and_then(|o| o.get(key));
            // with a base, a field only conflicts when both sides moved it
            // away from the base in different directions
            if base_obj.is_some() && (c == b || i == b) {
                continue;
            }
            regions.push(ConflictRegion {
                kind: RegionKind::Field,
                location: key.clone(),
                current: c.cloned().unwrap_or(Value::Null),
                incoming: i.cloned().unwrap_or(Value::Null),
                base: b.cloned(),
            });
        }
        return regions;
    }

    vec![ConflictRegion {
        kind: RegionKind::WholeContent,
        location: path.to_string(),
        current: current.clone(),
        incoming: incoming.clone(),
        base: base.cloned(),
    }]
}

fn classify(
    current: &VersionedArtifact,
    incoming: &VersionedArtifact,
    regions: &[ConflictRegion],
) -> ConflictSeverity {
    if current.critical || incoming.critical {
        return ConflictSeverity::Critical;
    }

    let field_regions = regions
        .iter()
        .filter(|r| r.kind == RegionKind::Field)
        .count();
    if field_regions > 0 {
        let total_fields = total_field_count(&current.content, &incoming.content);
        if total_fields > 0 && field_regions * 2 > total_fields {
            return ConflictSeverity::Critical;
        }
    }

    match regions.len() {
        0 => ConflictSeverity::Low,
        1 if regions[0].kind == RegionKind::Field => ConflictSeverity::Medium,
        1 => ConflictSeverity::High,
        _ => ConflictSeverity::High,
    }
}

fn total_field_count(current: &Value, incoming: &Value) -> usize {
    let (Some(c), Some(i)) = (current.as_object(), incoming.as_object()) else {
        return 0;
    };
    let mut keys: Vec<&String> = c.keys().chain(i.keys()).collect();
    keys.sort();
    keys.dedup();
    keys.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn forked_store(
        base_content: Value,
        current_content: Value,
        incoming_content: Value,
    ) -> (ArtifactStore, String, String) {
        let mut store = ArtifactStore::new();
        let base = store.put("doc.json", base_content, vec![]);
        let current = store.put("doc.json", current_content, vec![]);
        let incoming = store.put_from("doc.json", incoming_content, vec![], Some(&base.id), None);
        (store, current.id, incoming.id)
    }

    #[test]
    fn test_linear_history_is_not_a_conflict() {
        let mut store = ArtifactStore::new();
        let v1 = store.put("d", json!(1), vec![]);
        let v2 = store.put("d", json!(2), vec![]);
        assert!(detect(&store, &v2.id, &v1.id).unwrap().is_none());
        assert!(detect(&store, &v1.id, &v2.id).unwrap().is_none());
    }

    #[test]
    fn test_disjoint_field_edits_have_no_regions() {
        let (store, cur, inc) = forked_store(
            json!({"title": "t", "body": "b"}),
            json!({"title": "t2", "body": "b"}),
            json!({"title": "t", "body": "b2"}),
        );
        let conflict = detect(&store, &cur, &inc).unwrap().unwrap();
        // each side changed a different field; auto-merge can take both
        assert!(conflict.regions.is_empty());
        assert_eq!(conflict.severity, ConflictSeverity::Low);
    }

    #[test]
    fn test_same_field_both_changed_is_medium() {
        let (store, cur, inc) = forked_store(
            json!({"title": "t", "body": "b"}),
            json!({"title": "mine", "body": "b"}),
            json!({"title": "theirs", "body": "b"}),
        );
        let conflict = detect(&store, &cur, &inc).unwrap().unwrap();
        assert_eq!(conflict.regions.len(), 1);
        assert_eq!(conflict.regions[0].location, "title");
        assert_eq!(conflict.regions[0].base, Some(json!("t")));
        assert_eq!(conflict.severity, ConflictSeverity::Medium);
    }

    #[test]
    fn test_majority_of_fields_conflicting_is_critical() {
        let (store, cur, inc) = forked_store(
            json!({"a": 1, "b": 2, "c": 3}),
            json!({"a": 10, "b": 20, "c": 3}),
            json!({"a": 11, "b": 21, "c": 3}),
        );
        let conflict = detect(&store, &cur, &inc).unwrap().unwrap();
        assert_eq!(conflict.regions.len(), 2);
        assert_eq!(conflict.severity, ConflictSeverity::Critical);
    }

    #[test]
    fn test_critical_artifact_is_always_critical() {
        let mut store = ArtifactStore::new();
        store.mark_critical("doc.json");
        let base = store.put("doc.json", json!({"a": 1}), vec![]);
        let cur = store.put("doc.json", json!({"a": 2}), vec![]);
        let inc = store.put_from("doc.json", json!({"a": 3}), vec![], Some(&base.id), None);
        let conflict = detect(&store, &cur.id, &inc.id).unwrap().unwrap();
        assert_eq!(conflict.severity, ConflictSeverity::Critical);
    }

    #[test]
    fn test_opaque_content_whole_region() {
        let (store, cur, inc) = forked_store(json!("v0"), json!("mine"), json!("theirs"));
        let conflict = detect(&store, &cur, &inc).unwrap().unwrap();
        assert_eq!(conflict.regions.len(), 1);
        assert_eq!(conflict.regions[0].kind, RegionKind::WholeContent);
        assert_eq!(conflict.severity, ConflictSeverity::High);
    }

    #[test]
    fn test_shape_mismatch_is_schema_conflict() {
        let (store, cur, inc) =
            forked_store(json!("v0"), json!({"structured": true}), json!("plain"));
        let conflict = detect(&store, &cur, &inc).unwrap().unwrap();
        assert_eq!(conflict.conflict_type, ConflictType::SchemaConflict);
    }

    #[test]
    fn test_identical_content_divergent_history_is_low() {
        let (store, cur, inc) = forked_store(json!({"a": 1}), json!({"a": 2}), json!({"a": 2}));
        let conflict = detect(&store, &cur, &inc).unwrap().unwrap();
        assert!(conflict.regions.is_empty());
        assert_eq!(conflict.severity, ConflictSeverity::Low);
    }

    #[test]
    fn test_unknown_artifact_is_hard_error() {
        let store = ArtifactStore::new();
        assert!(matches!(
            detect(&store, "a", "b"),
            Err(EngineError::ArtifactNotFound(_))
        ));
    }
}
