use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::store::Document;

/// Hackathon project. Serialized with PascalCase field names (`ID`, `Name`,
/// ...); lowercase and snake_case names are accepted on input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(default)]
pub struct Project {
    #[serde(rename = "ID", alias = "id", alias = "Id")]
    pub id: String,
    #[serde(rename = "Name", alias = "name")]
    pub name: String,
    #[serde(rename = "Description", alias = "description")]
    pub description: String,
    #[serde(rename = "Tags", alias = "tags")]
    pub tags: Vec<String>,
    #[serde(rename = "TagLine", alias = "tag_line", alias = "tagline")]
    pub tag_line: String,
    #[serde(rename = "Members", alias = "members")]
    pub members: Vec<String>,
    #[serde(rename = "Photo", alias = "photo")]
    pub photo: String,
    #[serde(rename = "ApplicationArea", alias = "application_area")]
    pub application_area: Vec<String>,
    #[serde(rename = "Winner", alias = "winner")]
    pub winner: bool,
    #[serde(rename = "WinnerType", alias = "winner_type")]
    pub winner_type: String,
    #[serde(rename = "Hackathon", alias = "hackathon")]
    pub hackathon: String,
    #[serde(rename = "Year", alias = "year")]
    pub year: i32,
}

impl Document for Project {
    const COLLECTION: &'static str = "projects";

    fn key(&self) -> &str {
        &self.id
    }

    fn unique_fields(&self) -> Vec<(&'static str, &str)> {
        vec![("name", self.name.as_str())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_lowercase_input() {
        let project: Project =
            serde_json::from_value(json!({"name": "Foo", "members": ["a"], "year": 2023}))
                .unwrap();
        assert_eq!(project.name, "Foo");
        assert_eq!(project.members, vec!["a"]);
        assert_eq!(project.year, 2023);
        assert!(project.id.is_empty());
        assert!(!project.winner);
    }

    #[test]
    fn accepts_snake_case_input() {
        let project: Project = serde_json::from_value(json!({
            "name": "Bar",
            "tag_line": "fast",
            "application_area": ["health"],
            "winner_type": "gold",
        }))
        .unwrap();
        assert_eq!(project.tag_line, "fast");
        assert_eq!(project.application_area, vec!["health"]);
        assert_eq!(project.winner_type, "gold");
    }

    #[test]
    fn serializes_with_pascal_case_names() {
        let project = Project {
            id: "42".into(),
            name: "Foo".into(),
            ..Default::default()
        };
        let value = serde_json::to_value(&project).unwrap();
        assert_eq!(value["ID"], "42");
        assert_eq!(value["Name"], "Foo");
        assert_eq!(value["TagLine"], "");
        assert_eq!(value["ApplicationArea"], json!([]));
        assert!(value.get("name").is_none());
    }

    #[test]
    fn name_is_the_unique_field() {
        let project = Project {
            name: "Foo".into(),
            ..Default::default()
        };
        assert_eq!(project.unique_fields(), vec![("name", "Foo")]);
    }
}
