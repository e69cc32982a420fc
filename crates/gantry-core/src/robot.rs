use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RobotClassification {
    pub category: String,
    pub kind: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RobotInformation {
    pub name: String,
    pub firmware_version: String,
    pub main_function: String,
    pub description: String,
}

/// The robot under assessment. Both halves are filled in independently by the
/// classification and information capture forms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RobotProfile {
    pub classification: Option<RobotClassification>,
    pub information: Option<RobotInformation>,
}
