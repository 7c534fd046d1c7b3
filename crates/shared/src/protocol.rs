use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{ObjectId, PackageId};

pub const CONTRACT_MODULE: &str = "pizza";
pub const COOK_FUNCTION: &str = "cook";
pub const GET_FLAG_FUNCTION: &str = "get_flag";

/// Fully qualified Move entry function, `package::module::function`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallTarget {
    pub package: PackageId,
    pub module: String,
    pub function: String,
}

impl CallTarget {
    pub fn contract(package: PackageId, function: &str) -> Self {
        Self {
            package,
            module: CONTRACT_MODULE.to_string(),
            function: function.to_string(),
        }
    }
}

impl fmt::Display for CallTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.package, self.module, self.function)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CallArg {
    PureU16(u16),
    Object(ObjectId),
}

/// What the external signer receives: a target plus ordered, typed arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallDescriptor {
    pub target: CallTarget,
    pub arguments: Vec<CallArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatusKind {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStatus {
    pub status: ExecutionStatusKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatusKind::Success
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    pub object_id: ObjectId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedObject {
    pub reference: ObjectRef,
}

/// The effect list a finalized transaction reports back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEffects {
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub created: Vec<CreatedObject>,
}

impl TransactionEffects {
    pub fn first_created(&self) -> Option<&ObjectId> {
        self.created.first().map(|c| &c.reference.object_id)
    }
}

/// Raw object record from the read boundary, content shape unvalidated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectData {
    pub object_id: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ObjectContent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectContent {
    pub data_type: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_tag: Option<String>,
    #[serde(default)]
    pub fields: serde_json::Value,
}

impl ObjectContent {
    pub fn is_move_object(&self) -> bool {
        self.data_type == "moveObject"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effects_deserialize_from_ledger_json() {
        let effects: TransactionEffects = serde_json::from_value(serde_json::json!({
            "status": { "status": "success" },
            "created": [
                { "reference": { "objectId": "0xbox1", "version": 3, "digest": "9rj" } }
            ]
        }))
        .expect("effects");
        assert!(effects.status.is_success());
        assert_eq!(effects.first_created(), Some(&ObjectId::from("0xbox1")));
    }

    #[test]
    fn effects_without_created_entries_are_valid() {
        let effects: TransactionEffects = serde_json::from_value(serde_json::json!({
            "status": { "status": "failure", "error": "MoveAbort(1)" }
        }))
        .expect("effects");
        assert!(!effects.status.is_success());
        assert_eq!(effects.first_created(), None);
    }

    #[test]
    fn call_target_renders_fully_qualified() {
        let target = CallTarget::contract(PackageId::from("0xp"), COOK_FUNCTION);
        assert_eq!(target.to_string(), "0xp::pizza::cook");
    }
}
