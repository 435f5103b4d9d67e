//! Typed access to JSON payloads

use serde::de::DeserializeOwned;

use crate::event::Event;

impl Event {
    /// Deserialise `data` as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.data)
    }

    /// Like [Event::json] but the error carries the path to the value that failed
    pub fn json_with_path<T: DeserializeOwned>(
        &self,
    ) -> Result<T, serde_path_to_error::Error<serde_json::Error>> {
        let mut deserializer = serde_json::Deserializer::from_slice(&self.data);
        serde_path_to_error::deserialize(&mut deserializer)
    }
}
