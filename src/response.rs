use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct Meta {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub total: Option<i64>,
}

impl Meta {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
            total: Some(total),
        }
    }

    pub fn empty() -> Self {
        Self {
            page: None,
            per_page: None,
            total: None,
        }
    }
}

/// Envelope for every JSON reply. Absent `data` and `meta` are omitted
/// from the wire format rather than serialized as null.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T, meta: Option<Meta>) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_meta_is_omitted_from_the_envelope() {
        let resp = ApiResponse::success("Products", vec![1, 2], None);
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"message":"Products","data":[1,2]}"#);

        let resp = ApiResponse::success("Products", vec![1, 2], Some(Meta::new(1, 20, 2)));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""meta":{"page":1,"per_page":20,"total":2}"#));
    }
}
