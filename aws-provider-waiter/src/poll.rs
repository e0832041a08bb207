//! The outcome of a single status query.

/// One observation of a remote resource.
///
/// A result without an object means the resource could not be found. Status
/// functions map their API's "does not exist" error into
/// [`PollResult::not_found`] so the wait's [`NotFoundPolicy`](crate::NotFoundPolicy)
/// decides what absence means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResult<T> {
    object: Option<T>,
    status: String,
}

impl<T> PollResult<T> {
    pub fn new(object: T, status: impl Into<String>) -> Self {
        Self {
            object: Some(object),
            status: status.into(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            object: None,
            status: String::new(),
        }
    }

    /// Map a finder's result into an observation.
    ///
    /// Errors matching `is_not_found` become [`PollResult::not_found`]; other
    /// errors are returned unchanged.
    pub fn from_find<E>(
        found: Result<T, E>,
        is_not_found: impl FnOnce(&E) -> bool,
        status_of: impl FnOnce(&T) -> String,
    ) -> Result<Self, E> {
        match found {
            Ok(object) => {
                let status = status_of(&object);
                Ok(Self::new(object, status))
            }
            Err(err) if is_not_found(&err) => Ok(Self::not_found()),
            Err(err) => Err(err),
        }
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn object(&self) -> Option<&T> {
        self.object.as_ref()
    }

    pub fn is_not_found(&self) -> bool {
        self.object.is_none()
    }

    pub(crate) fn into_parts(self) -> (Option<T>, String) {
        (self.object, self.status)
    }
}
