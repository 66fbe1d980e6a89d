//! Opaque payload carried through a pipeline.

use std::any::Any;

/// An opaque, any-typed value flowing through the handler chain.
///
/// The dispatcher transports payloads without interpreting them; each
/// protocol layer downcasts to the message types it understands and
/// re-wraps whatever it forwards onward.
///
/// # Example
///
/// ```rust
/// use kedja_core::Payload;
///
/// let payload = Payload::new(vec![1u8, 2, 3]);
/// assert!(payload.is::<Vec<u8>>());
/// let bytes: Vec<u8> = payload.downcast().unwrap();
/// assert_eq!(bytes, [1, 2, 3]);
/// ```
pub struct Payload {
    value: Box<dyn Any>,
    type_name: &'static str,
}

impl Payload {
    /// Wrap a value for transport through the chain.
    pub fn new<T: 'static>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// The `type_name` of the wrapped value, for diagnostics only.
    ///
    /// The returned string is not stable across compiler versions; never
    /// dispatch on it.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the wrapped value is of type `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Take the wrapped value out, if it is of type `T`.
    ///
    /// Returns `Err(self)` unchanged otherwise, so a handler can forward a
    /// payload it does not understand.
    pub fn downcast<T: 'static>(self) -> Result<T, Payload> {
        let Self { value, type_name } = self;
        match value.downcast::<T>() {
            Ok(v) => Ok(*v),
            Err(value) => Err(Self { value, type_name }),
        }
    }

    /// Borrow the wrapped value, if it is of type `T`.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Payload")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}

impl<T: 'static> From<Box<T>> for Payload {
    fn from(value: Box<T>) -> Self {
        Self {
            value,
            type_name: std::any::type_name::<T>(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Payload;

    #[test]
    fn downcast_to_wrapped_type() {
        let payload = Payload::new(String::from("hej"));
        assert!(payload.is::<String>());
        assert_eq!(payload.downcast_ref::<String>().unwrap(), "hej");
        assert_eq!(payload.downcast::<String>().unwrap(), "hej");
    }

    #[test]
    fn downcast_to_wrong_type_returns_payload() {
        let payload = Payload::new(7u32);
        let payload = payload.downcast::<String>().unwrap_err();
        // The payload survives a failed downcast intact.
        assert_eq!(payload.downcast::<u32>().unwrap(), 7);
    }

    #[test]
    fn type_name_reflects_wrapped_type() {
        let payload = Payload::new(3.5f64);
        assert!(payload.type_name().contains("f64"));
    }
}
