use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MachineStatus {
    Online,
    Offline,
    Pending,
}

impl MachineStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "ONLINE",
            Self::Offline => "OFFLINE",
            Self::Pending => "PENDING",
        }
    }
}

/// One managed machine as reported by the status endpoint. `name` doubles as
/// the hostname the log endpoint is queried with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: String,
    pub name: String,
    pub status: MachineStatus,
    pub os: String,
}

#[cfg(test)]
mod tests {
    use super::{Machine, MachineStatus};

    #[test]
    fn status_serde_uses_uppercase_wire_names() {
        let machine: Machine = serde_json::from_str(
            r#"{"id":"m1","name":"db-1","status":"PENDING","os":"debian 11"}"#,
        )
        .expect("parse machine");
        assert_eq!(machine.status, MachineStatus::Pending);
        assert_eq!(machine.status.as_str(), "PENDING");

        let rendered = serde_json::to_string(&machine).expect("serialize");
        assert!(rendered.contains("\"PENDING\""));
    }
}
