use crate::model::element::ElementId;

/// Convenience result type used across certstamp.
pub type StampResult<T> = Result<T, StampError>;

/// Top-level error taxonomy used by the editing model and the renderers.
#[derive(thiserror::Error, Debug)]
pub enum StampError {
    /// Invalid user-provided model, project or dataset data.
    #[error("validation error: {0}")]
    Validation(String),

    /// A text element bound to `field` already exists on the template.
    #[error("duplicate field: a text element for '{field}' already exists on this template")]
    DuplicateField {
        /// Field name that is already bound.
        field: String,
    },

    /// The field name is not one of the dataset headers.
    #[error("unknown field: '{field}' is not a dataset header")]
    UnknownField {
        /// Field name that was requested.
        field: String,
    },

    /// No element with this id exists on the template.
    #[error("unknown element: {0}")]
    UnknownElement(ElementId),

    /// An image element's source could not be read or decoded.
    #[error("image decode error for element {element}: {reason}")]
    ImageDecode {
        /// Element whose source failed.
        element: ElementId,
        /// Human-readable cause.
        reason: String,
    },

    /// Errors while drawing or encoding an output image.
    #[error("render error: {0}")]
    Render(String),

    /// Errors while assembling the output archive.
    #[error("archive error: {0}")]
    Archive(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StampError {
    /// Build a [`StampError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`StampError::DuplicateField`] value.
    pub fn duplicate_field(field: impl Into<String>) -> Self {
        Self::DuplicateField {
            field: field.into(),
        }
    }

    /// Build a [`StampError::ImageDecode`] value.
    pub fn image_decode(element: ElementId, reason: impl std::fmt::Display) -> Self {
        Self::ImageDecode {
            element,
            reason: reason.to_string(),
        }
    }

    /// Build a [`StampError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`StampError::Archive`] value.
    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }
}

impl From<zip::result::ZipError> for StampError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Archive(err.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
