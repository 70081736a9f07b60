//! Medication records extracted from decrypted prescription documents.
//!
//! The document nests its clinical conducts twice: each `extension` node
//! carries `valueCodeableConcept.text`, a string that is itself a JSON array
//! of conducts. The inner string is decoded separately per node so a broken
//! node never hides the records of its siblings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::document::DecryptedDocument;

/// Conduct `type` that marks a medication prescription.
pub const PRESCRIPTION_CONDUCT_TYPE: &str = "Prescrição de medicamento";

/// Placeholder for a detail the prescription does not provide.
pub const NOT_AVAILABLE: &str = "N/A";

/// One prescribed medication, flattened for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationRecord {
    /// Medication name
    pub medication: String,

    /// Dose, free text (e.g. "500mg")
    pub dose: String,

    /// Administration route (e.g. "oral")
    pub administration: String,
}

impl MedicationRecord {
    /// Build a record from a conduct's `details` mapping, defaulting missing
    /// fields to [`NOT_AVAILABLE`].
    #[must_use]
    pub fn from_details(details: &Map<String, Value>) -> Self {
        Self {
            medication: detail_text(details, "medication"),
            dose: detail_text(details, "dose"),
            administration: detail_text(details, "administration"),
        }
    }
}

/// A clinical conduct from the inner JSON array.
#[derive(Debug, Clone, PartialEq)]
pub struct Conduct<'a> {
    /// Conduct kind; `None` when absent or not a string
    pub kind: Option<&'a str>,

    /// Conduct details; empty when absent or not an object
    pub details: Option<&'a Map<String, Value>>,
}

impl<'a> Conduct<'a> {
    /// View a JSON value as a conduct.
    #[must_use]
    pub fn from_value(value: &'a Value) -> Self {
        Self {
            kind: value.get("type").and_then(Value::as_str),
            details: value.get("details").and_then(Value::as_object),
        }
    }

    /// Whether this conduct is a medication prescription.
    #[must_use]
    pub fn is_prescription(&self) -> bool {
        self.kind == Some(PRESCRIPTION_CONDUCT_TYPE)
    }

    /// Flatten into a medication record.
    #[must_use]
    pub fn to_record(&self) -> MedicationRecord {
        match self.details {
            Some(details) => MedicationRecord::from_details(details),
            None => MedicationRecord::from_details(&Map::new()),
        }
    }
}

/// Extract every medication prescription from a decrypted document.
///
/// Never fails: structural mismatches at any level produce no records for
/// that part of the document. Output follows node order, then conduct order
/// within each node.
#[must_use]
pub fn extract_medications(doc: &DecryptedDocument) -> Vec<MedicationRecord> {
    let mut records = Vec::new();

    for (index, node) in doc.extension_nodes().enumerate() {
        let Some(conducts) = node_conducts(node) else {
            tracing::debug!(node = index, "extension node has no readable conducts");
            continue;
        };

        records.extend(
            conducts
                .iter()
                .map(Conduct::from_value)
                .filter(Conduct::is_prescription)
                .map(|conduct| conduct.to_record()),
        );
    }

    records
}

/// Decode the conduct array embedded in a node's `valueCodeableConcept.text`.
fn node_conducts(node: &Value) -> Option<Vec<Value>> {
    let text = node
        .get("valueCodeableConcept")?
        .get("text")?
        .as_str()?;

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(conducts)) => Some(conducts),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("conduct text is not valid JSON: {e}");
            None
        }
    }
}

/// Read a detail field as display text.
///
/// Strings are used verbatim, `null` or absence gives [`NOT_AVAILABLE`], and
/// any other value is rendered as compact JSON.
fn detail_text(details: &Map<String, Value>, field: &str) -> String {
    match details.get(field) {
        None | Some(Value::Null) => NOT_AVAILABLE.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(conducts: &Value) -> Value {
        json!({"valueCodeableConcept": {"text": conducts.to_string()}})
    }

    fn prescription(medication: &str) -> Value {
        json!({
            "type": PRESCRIPTION_CONDUCT_TYPE,
            "details": {"medication": medication, "dose": "1g", "administration": "oral"}
        })
    }

    #[test]
    fn test_extract_single_prescription() {
        let raw = r#"{"extension":[{"valueCodeableConcept":{"text":"[{\"type\":\"Prescrição de medicamento\",\"details\":{\"medication\":\"Paracetamol\",\"dose\":\"500mg\",\"administration\":\"oral\"}}]"}}]}"#;
        let doc = DecryptedDocument::from_plaintext(raw.as_bytes()).expect("Should parse");

        let records = extract_medications(&doc);
        assert_eq!(
            records,
            vec![MedicationRecord {
                medication: "Paracetamol".to_string(),
                dose: "500mg".to_string(),
                administration: "oral".to_string(),
            }]
        );
    }

    #[test]
    fn test_extract_without_extension() {
        let doc = DecryptedDocument::new(json!({}));
        assert!(extract_medications(&doc).is_empty());

        let doc = DecryptedDocument::new(json!({"extension": []}));
        assert!(extract_medications(&doc).is_empty());
    }

    #[test]
    fn test_extract_preserves_node_order() {
        let doc = DecryptedDocument::new(json!({
            "extension": [
                node(&json!([prescription("Amoxicilina")])),
                node(&json!([prescription("Dipirona"), prescription("Losartana")])),
            ]
        }));

        let names: Vec<String> = extract_medications(&doc)
            .into_iter()
            .map(|r| r.medication)
            .collect();
        assert_eq!(names, vec!["Amoxicilina", "Dipirona", "Losartana"]);
    }

    #[test]
    fn test_extract_fills_defaults() {
        let doc = DecryptedDocument::new(json!({
            "extension": [node(&json!([
                {"type": PRESCRIPTION_CONDUCT_TYPE, "details": {"medication": "Ibuprofeno"}},
                {"type": PRESCRIPTION_CONDUCT_TYPE},
            ]))]
        }));

        let records = extract_medications(&doc);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].medication, "Ibuprofeno");
        assert_eq!(records[0].dose, NOT_AVAILABLE);
        assert_eq!(records[0].administration, NOT_AVAILABLE);
        assert_eq!(records[1].medication, NOT_AVAILABLE);
        assert_eq!(records[1].dose, NOT_AVAILABLE);
        assert_eq!(records[1].administration, NOT_AVAILABLE);
    }

    #[test]
    fn test_extract_skips_other_conduct_types() {
        let doc = DecryptedDocument::new(json!({
            "extension": [node(&json!([
                {"type": "Solicitação de exame", "details": {"exam": "Hemograma"}},
                {"type": "prescrição de medicamento", "details": {"medication": "X"}},
                {"details": {"medication": "Y"}},
                prescription("Omeprazol"),
            ]))]
        }));

        let records = extract_medications(&doc);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].medication, "Omeprazol");
    }

    #[test]
    fn test_malformed_node_does_not_hide_siblings() {
        let doc = DecryptedDocument::new(json!({
            "extension": [
                {"valueCodeableConcept": {"text": "[{broken"}},
                {"valueCodeableConcept": {"text": 42}},
                {"valueCodeableConcept": {"text": "{\"type\": \"not an array\"}"}},
                {"url": "no concept here"},
                "not even an object",
                node(&json!([prescription("Metformina")])),
            ]
        }));

        let records = extract_medications(&doc);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].medication, "Metformina");
    }

    #[test]
    fn test_extract_is_total_over_odd_shapes() {
        for value in [
            json!(null),
            json!(17),
            json!("text"),
            json!([1, 2, 3]),
            json!({"extension": null}),
            json!({"extension": {"valueCodeableConcept": {}}}),
            json!({"extension": [null, [], {}]}),
        ] {
            assert!(extract_medications(&DecryptedDocument::new(value)).is_empty());
        }
    }

    #[test]
    fn test_detail_values_are_coerced_to_text() {
        let doc = DecryptedDocument::new(json!({
            "extension": [node(&json!([{
                "type": PRESCRIPTION_CONDUCT_TYPE,
                "details": {"medication": "Insulina", "dose": 10, "administration": null}
            }]))]
        }));

        let records = extract_medications(&doc);
        assert_eq!(records[0].dose, "10");
        assert_eq!(records[0].administration, NOT_AVAILABLE);
    }

    #[test]
    fn test_non_object_details_treated_as_empty() {
        let value = json!({"type": PRESCRIPTION_CONDUCT_TYPE, "details": "see chart"});
        let conduct = Conduct::from_value(&value);
        assert!(conduct.is_prescription());
        assert_eq!(conduct.to_record().medication, NOT_AVAILABLE);
    }

    #[test]
    fn test_record_serializes_with_plain_field_names() {
        let record = MedicationRecord::from_details(&Map::new());
        let value = serde_json::to_value(&record).expect("Should serialize");
        assert_eq!(
            value,
            json!({"medication": "N/A", "dose": "N/A", "administration": "N/A"})
        );
    }
}
