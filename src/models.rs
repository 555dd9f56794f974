//! Data models for Microsoft Graph responses and exported records.

use serde::{Deserialize, Serialize};

/// A Graph collection page.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(default, rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// A SharePoint site.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// A document library or personal drive.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drive {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A directory user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user_principal_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderFacet {
    #[serde(default)]
    pub child_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFacet {
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReference {
    #[serde(default)]
    pub drive_id: Option<String>,
}

/// A node in a drive's folder tree.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub folder: Option<FolderFacet>,
    #[serde(default)]
    pub file: Option<FileFacet>,
    #[serde(default, rename = "@microsoft.graph.downloadUrl")]
    pub download_url: Option<String>,
    #[serde(default)]
    pub parent_reference: Option<ItemReference>,
}

/// What a drive item is, as far as the walk is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    File,
    Folder { child_count: i64 },
    Other,
}

impl DriveItem {
    /// Classify the item. The file facet wins if a payload carries both.
    pub fn kind(&self) -> ItemKind {
        match (&self.file, &self.folder) {
            (Some(_), _) => ItemKind::File,
            (None, Some(folder)) => ItemKind::Folder {
                child_count: folder.child_count,
            },
            (None, None) => ItemKind::Other,
        }
    }

    /// True for folders with at least one child.
    pub fn is_non_empty_folder(&self) -> bool {
        matches!(self.kind(), ItemKind::Folder { child_count } if child_count > 0)
    }

    /// Drive id from the parent reference, if present and non-empty.
    pub fn parent_drive_id(&self) -> Option<&str> {
        self.parent_reference
            .as_ref()
            .and_then(|r| r.drive_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    /// The exported record for a file item; `None` for anything else.
    pub fn to_artifact(&self) -> Option<ArtifactRecord> {
        let file = self.file.as_ref()?;
        Some(ArtifactRecord {
            name: self.name.clone().unwrap_or_default(),
            mime_type: file.mime_type.clone().unwrap_or_default(),
            download_url: self.download_url.clone().unwrap_or_default(),
        })
    }
}

/// One exported artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub name: String,
    #[serde(rename = "mime-type")]
    pub mime_type: String,
    #[serde(rename = "downloadUrl")]
    pub download_url: String,
}

/// Graph API error response.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// OAuth2 token response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub token_type: String,
    pub access_token: String,
    #[serde(default)]
    pub expires_in: u64,
}

/// OAuth2 error response from the token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_item_deserialize() {
        let json = r#"{
            "id": "01ABC",
            "name": "Standup-20250429.mp4",
            "file": {"mimeType": "video/mp4"},
            "@microsoft.graph.downloadUrl": "https://contoso.sharepoint.com/download?x=1",
            "parentReference": {"driveId": "b!drive"}
        }"#;

        let item: DriveItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.kind(), ItemKind::File);
        assert_eq!(item.parent_drive_id(), Some("b!drive"));

        let record = item.to_artifact().unwrap();
        assert_eq!(record.name, "Standup-20250429.mp4");
        assert_eq!(record.mime_type, "video/mp4");
        assert_eq!(record.download_url, "https://contoso.sharepoint.com/download?x=1");
    }

    #[test]
    fn test_folder_item_deserialize() {
        let json = r#"{"id": "F1", "name": "Recordings", "folder": {"childCount": 3}}"#;

        let item: DriveItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.kind(), ItemKind::Folder { child_count: 3 });
        assert!(item.is_non_empty_folder());
        assert!(item.to_artifact().is_none());
        assert_eq!(item.parent_drive_id(), None);
    }

    #[test]
    fn test_empty_folder_is_not_walkable() {
        let json = r#"{"id": "F2", "folder": {"childCount": 0}}"#;
        let item: DriveItem = serde_json::from_str(json).unwrap();
        assert!(!item.is_non_empty_folder());
    }

    #[test]
    fn test_file_facet_wins_over_folder() {
        let json = r#"{"id": "X", "file": {}, "folder": {"childCount": 2}}"#;
        let item: DriveItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.kind(), ItemKind::File);
        assert!(!item.is_non_empty_folder());
    }

    #[test]
    fn test_page_with_next_link() {
        let json = r#"{
            "value": [{"id": "s1"}, {"id": "s2"}],
            "@odata.nextLink": "https://graph.microsoft.com/v1.0/sites?$skiptoken=abc"
        }"#;

        let page: Page<Site> = serde_json::from_str(json).unwrap();
        assert_eq!(page.value.len(), 2);
        assert!(page.next_link.unwrap().contains("skiptoken"));
    }

    #[test]
    fn test_page_without_value() {
        let page: Page<User> = serde_json::from_str("{}").unwrap();
        assert!(page.value.is_empty());
        assert!(page.next_link.is_none());
    }

    #[test]
    fn test_artifact_record_field_names() {
        let record = ArtifactRecord {
            name: "a.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            download_url: "https://x/a".to_string(),
        };

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"name":"a.pdf","mime-type":"application/pdf","downloadUrl":"https://x/a"}"#
        );
    }
}
