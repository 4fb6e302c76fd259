//! # Response Formatting
//!
//! Success envelopes returned by the resource endpoints.

use serde::Serialize;

/// List response with the total number of matching rows
#[derive(Debug, Clone, Serialize)]
pub struct ListResponse<T: Serialize> {
    pub success: bool,
    pub data: Vec<T>,
    /// Rows matching the filters, before pagination
    pub total: usize,
}

impl<T: Serialize> ListResponse<T> {
    pub fn new(data: Vec<T>, total: usize) -> Self {
        Self {
            success: true,
            data,
            total,
        }
    }
}

/// Create response carrying the stored records
#[derive(Debug, Clone, Serialize)]
pub struct CreatedResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: Vec<T>,
}

impl<T: Serialize> CreatedResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            success: true,
            message: "Resource added successfully".to_string(),
            data,
        }
    }
}

/// Acknowledgement without a body
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn bulk_updated() -> Self {
        Self::new("Resource Updated successfully")
    }

    pub fn patched() -> Self {
        Self::new("obj updated successfully")
    }
}

/// Association batch acknowledgement with per-item outcomes
#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: Vec<T>,
}

impl<T: Serialize> BatchResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            success: true,
            message: "Updated Successfully".to_string(),
            data,
        }
    }
}
