use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(AccountAddress);
id_newtype!(ObjectId);
id_newtype!(TransactionDigest);
id_newtype!(PackageId);

/// The kind half of the durable storage key. Each account stores at most one
/// object reference per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    PizzaBox,
    Flag,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::PizzaBox => "pizza_box",
            EntityKind::Flag => "flag",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pizza_box" => Some(EntityKind::PizzaBox),
            "flag" => Some(EntityKind::Flag),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const INGREDIENT_MAX: u32 = u16::MAX as u32;

/// Unvalidated ingredient quantities, straight from user input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecipe {
    pub olive_oils: u32,
    pub yeast: u32,
    pub flour: u32,
    pub water: u32,
    pub salt: u32,
    pub tomato_sauce: u32,
    pub cheese: u32,
    pub pineapple: u32,
}

/// A range-checked recipe. The contract encodes each ingredient as a `u16`,
/// so construction rejects anything above [`INGREDIENT_MAX`] instead of
/// truncating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PizzaRecipe {
    pub olive_oils: u16,
    pub yeast: u16,
    pub flour: u16,
    pub water: u16,
    pub salt: u16,
    pub tomato_sauce: u16,
    pub cheese: u16,
    pub pineapple: u16,
}

impl PizzaRecipe {
    pub fn from_raw(raw: &RawRecipe) -> Result<Self, ValidationError> {
        Ok(Self {
            olive_oils: bounded("olive_oils", raw.olive_oils)?,
            yeast: bounded("yeast", raw.yeast)?,
            flour: bounded("flour", raw.flour)?,
            water: bounded("water", raw.water)?,
            salt: bounded("salt", raw.salt)?,
            tomato_sauce: bounded("tomato_sauce", raw.tomato_sauce)?,
            cheese: bounded("cheese", raw.cheese)?,
            pineapple: bounded("pineapple", raw.pineapple)?,
        })
    }

    /// Ingredients in the argument order the contract's `cook` entry expects.
    pub fn as_args(&self) -> [u16; 8] {
        [
            self.olive_oils,
            self.yeast,
            self.flour,
            self.water,
            self.salt,
            self.tomato_sauce,
            self.cheese,
            self.pineapple,
        ]
    }
}

fn bounded(field: &'static str, value: u32) -> Result<u16, ValidationError> {
    u16::try_from(value).map_err(|_| ValidationError::OutOfRange {
        field,
        value,
        max: INGREDIENT_MAX,
    })
}
