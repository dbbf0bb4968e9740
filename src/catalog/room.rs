use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A bookable room as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    #[serde(alias = "location")]
    pub city: String,
    pub description: String,
    #[serde(default)]
    pub amenities: Vec<String>,
    /// Nightly price.
    pub price: f64,
    #[serde(default = "default_capacity", alias = "max_guests")]
    pub capacity: u32,
    #[serde(default = "default_beds")]
    pub beds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_type: Option<String>,
    #[serde(default)]
    pub has_kitchen: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_to: Option<NaiveDate>,
}

fn default_capacity() -> u32 {
    2
}

fn default_beds() -> u32 {
    1
}

impl Room {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        city: impl Into<String>,
        description: impl Into<String>,
        price: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            city: city.into(),
            description: description.into(),
            amenities: Vec::new(),
            price,
            capacity: default_capacity(),
            beds: default_beds(),
            room_type: None,
            has_kitchen: false,
            available_from: None,
            available_to: None,
        }
    }

    pub fn with_amenities<I, S>(mut self, amenities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.amenities = amenities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_room_type(mut self, room_type: impl Into<String>) -> Self {
        self.room_type = Some(room_type.into());
        self
    }

    pub fn with_kitchen(mut self, has_kitchen: bool) -> Self {
        self.has_kitchen = has_kitchen;
        self
    }

    /// Text the catalog embeds for this room when no explicit text is given.
    pub fn embedding_text(&self) -> String {
        let mut parts = vec![self.name.clone()];
        if let Some(room_type) = &self.room_type {
            parts.push(room_type.clone());
        }
        parts.push(format!("in {}", self.city));
        parts.push(self.description.clone());
        if self.has_kitchen {
            parts.push("kitchen".to_string());
        }
        if !self.amenities.is_empty() {
            parts.push(self.amenities.join(", "));
        }
        parts.join(". ")
    }

    /// Reject records the catalog cannot store.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("room id must not be empty".to_string());
        }
        if self.name.trim().is_empty() {
            return Err(format!("room {} has no name", self.id));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(format!("room {} has invalid price {}", self.id, self.price));
        }
        if let (Some(from), Some(to)) = (self.available_from, self.available_to) {
            if from > to {
                return Err(format!(
                    "room {} is available from {from} after {to}",
                    self.id
                ));
            }
        }
        Ok(())
    }
}

/// Optional constraints applied before ranking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomFilter {
    /// City name, compared case-insensitively.
    pub city: Option<String>,
    /// Inclusive upper bound on the nightly price.
    pub max_price: Option<f64>,
}

impl RoomFilter {
    pub fn is_empty(&self) -> bool {
        self.city.is_none() && self.max_price.is_none()
    }
}
