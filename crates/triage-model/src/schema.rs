//! Persisted ticket schema
//!
//! Every ticket document is checked against [`TICKET_SCHEMA`] before it is
//! written. The field names are the storage contract and must not drift.
//! Top-level keys outside the contract are allowed so ingestion filters can
//! stamp documents; nested objects stay closed.

use jsonschema::{Draft, Validator};
use once_cell::sync::Lazy;
use serde_json::Value;

use crate::error::ModelError;
use crate::ticket::Ticket;

/// JSON schema of a stored ticket
pub const TICKET_SCHEMA: &str = r##"{
  "$schema": "http://json-schema.org/draft-07/schema#",
  "title": "Ticket",
  "type": "object",
  "required": ["name", "type", "status", "schema", "created", "modified"],
  "definitions": {
    "access": {
      "type": "object",
      "properties": {
        "users": { "type": "array", "items": { "type": "string" } },
        "groups": { "type": "array", "items": { "type": "string" } }
      },
      "additionalProperties": false
    },
    "task": {
      "type": "object",
      "required": ["name", "type", "order"],
      "properties": {
        "name": { "type": "string" },
        "type": { "enum": ["task", "input", "automation"] },
        "automation": { "type": "string" },
        "data": {},
        "order": { "type": "integer", "minimum": 0 },
        "next": { "type": "array", "items": { "type": "string" }, "uniqueItems": true },
        "done": { "type": "boolean" },
        "output": {}
      },
      "additionalProperties": false
    }
  },
  "properties": {
    "name": { "type": "string", "minLength": 1 },
    "owner": { "type": "string" },
    "status": { "type": "string", "minLength": 1 },
    "type": { "type": "string", "minLength": 1 },
    "details": { "type": "object" },
    "schema": { "type": "string" },
    "created": { "type": "string", "format": "date-time" },
    "modified": { "type": "string", "format": "date-time" },
    "artifacts": {
      "type": "array",
      "items": {
        "type": "object",
        "required": ["name"],
        "properties": {
          "name": { "type": "string", "minLength": 1 },
          "type": { "type": "string" },
          "status": { "type": "string" }
        },
        "additionalProperties": false
      }
    },
    "comments": {
      "type": "array",
      "items": {
        "type": "object",
        "required": ["creator", "created", "message"],
        "properties": {
          "creator": { "type": "string" },
          "created": { "type": "string", "format": "date-time" },
          "message": { "type": "string" }
        },
        "additionalProperties": false
      }
    },
    "references": {
      "type": "array",
      "items": {
        "type": "object",
        "required": ["href", "name"],
        "properties": {
          "href": { "type": "string" },
          "name": { "type": "string" }
        },
        "additionalProperties": false
      }
    },
    "files": {
      "type": "array",
      "items": {
        "type": "object",
        "required": ["key", "name"],
        "properties": {
          "key": { "type": "string" },
          "name": { "type": "string" }
        },
        "additionalProperties": false
      }
    },
    "playbooks": {
      "type": "object",
      "additionalProperties": {
        "type": "object",
        "required": ["name", "tasks"],
        "properties": {
          "name": { "type": "string" },
          "tasks": { "type": "object", "additionalProperties": { "$ref": "#/definitions/task" } }
        },
        "additionalProperties": false
      }
    },
    "read": { "$ref": "#/definitions/access" },
    "write": { "$ref": "#/definitions/access" }
  }
}"##;

static TICKET_VALIDATOR: Lazy<Validator> = Lazy::new(|| {
    let schema: Value = serde_json::from_str(TICKET_SCHEMA).expect("ticket schema is valid json");
    jsonschema::options()
        .with_draft(Draft::Draft7)
        .build(&schema)
        .expect("ticket schema to compile")
});

/// Schema violations of a JSON document, formatted as `<path>: <message>`
#[must_use]
pub fn violations(document: &Value) -> Vec<String> {
    TICKET_VALIDATOR
        .iter_errors(document)
        .map(|err| {
            let path = err.instance_path.to_string();
            if path.is_empty() {
                err.to_string()
            } else {
                format!("{path}: {err}")
            }
        })
        .collect()
}

/// Validate a ticket against the persisted schema
///
/// # Errors
/// `ModelError::Validation` listing every violation
pub fn validate_ticket(ticket: &Ticket) -> Result<(), ModelError> {
    validate_document(&serde_json::to_value(ticket)?)
}

/// Validate a stored ticket document
///
/// # Errors
/// `ModelError::Validation` listing every violation
pub fn validate_document(document: &Value) -> Result<(), ModelError> {
    let errors = violations(document);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ModelError::Validation(errors))
    }
}
