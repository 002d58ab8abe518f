//! S3 ListObjectsV2 response types
//!
//! Data structures for deserializing the XML listing responses of
//! S3-compatible object stores.

use serde::Deserialize;

/// ListObjectsV2 response body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListBucketResult {
    /// Objects in this page
    #[serde(default)]
    pub contents: Vec<Contents>,

    /// Whether more pages follow
    #[serde(default)]
    pub is_truncated: bool,

    /// Token for the next page when truncated
    pub next_continuation_token: Option<String>,
}

/// One object entry of a listing page
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Contents {
    /// Full object key
    pub key: String,

    /// Object size in bytes
    pub size: u64,

    /// Last modification time (RFC 3339)
    pub last_modified: Option<String>,

    /// Entity tag as reported by the store, quotes included
    pub e_tag: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_listing_page() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
                <Name>displays</Name>
                <Prefix>lobby/dev1/media/</Prefix>
                <KeyCount>2</KeyCount>
                <MaxKeys>1000</MaxKeys>
                <IsTruncated>true</IsTruncated>
                <NextContinuationToken>token-abc</NextContinuationToken>
                <Contents>
                    <Key>lobby/dev1/media/intro.mp4</Key>
                    <LastModified>2024-05-01T10:00:00.000Z</LastModified>
                    <ETag>"9e107d9d372bb6826bd81d3542a419d6"</ETag>
                    <Size>1048576</Size>
                    <StorageClass>STANDARD</StorageClass>
                </Contents>
                <Contents>
                    <Key>lobby/dev1/media/promo.png</Key>
                    <Size>2048</Size>
                </Contents>
            </ListBucketResult>"#;

        let result: ListBucketResult = quick_xml::de::from_str(xml).unwrap();
        assert!(result.is_truncated);
        assert_eq!(result.next_continuation_token, Some("token-abc".to_string()));
        assert_eq!(result.contents.len(), 2);
        assert_eq!(result.contents[0].key, "lobby/dev1/media/intro.mp4");
        assert_eq!(result.contents[0].size, 1_048_576);
        assert_eq!(
            result.contents[0].e_tag.as_deref(),
            Some("\"9e107d9d372bb6826bd81d3542a419d6\"")
        );
        assert_eq!(result.contents[1].last_modified, None);
    }

    #[test]
    fn test_deserialize_empty_listing() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
                <Name>displays</Name>
                <KeyCount>0</KeyCount>
                <IsTruncated>false</IsTruncated>
            </ListBucketResult>"#;

        let result: ListBucketResult = quick_xml::de::from_str(xml).unwrap();
        assert!(result.contents.is_empty());
        assert!(!result.is_truncated);
        assert!(result.next_continuation_token.is_none());
    }
}
