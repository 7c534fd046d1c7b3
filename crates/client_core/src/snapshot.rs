use serde_json::Value;
use shared::{
    domain::{ObjectId, PizzaRecipe},
    protocol::ObjectData,
};

/// Decoded view of the on-chain pizza box as last fetched. `exists` and
/// `has_valid_data` are independent: an object can exist while its field
/// layout is unreadable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitySnapshot {
    pub reference: Option<ObjectId>,
    pub exists: bool,
    pub has_valid_data: bool,
    pub recipe: Option<PizzaRecipe>,
}

impl EntitySnapshot {
    /// No stored reference, nothing fetched. Idle, not an error.
    pub fn idle() -> Self {
        Self::default()
    }
}

/// Walks `content.fields.pizza.{attribute}` in the raw record. Any shape
/// mismatch yields `None`; the caller decides how to report it.
pub fn decode_recipe(record: &ObjectData) -> Option<PizzaRecipe> {
    let content = record.content.as_ref()?;
    if !content.is_move_object() {
        return None;
    }
    let pizza = content.fields.get("pizza")?;
    let pizza = pizza.get("fields").unwrap_or(pizza);

    Some(PizzaRecipe {
        olive_oils: field_u16(pizza, "olive_oils")?,
        yeast: field_u16(pizza, "yeast")?,
        flour: field_u16(pizza, "flour")?,
        water: field_u16(pizza, "water")?,
        salt: field_u16(pizza, "salt")?,
        tomato_sauce: field_u16(pizza, "tomato_sauce")?,
        cheese: field_u16(pizza, "cheese")?,
        pineapple: field_u16(pizza, "pineapple")?,
    })
}

// The read boundary reports small integers either as JSON numbers or as
// decimal strings depending on the node version.
fn field_u16(fields: &Value, name: &str) -> Option<u16> {
    let raw = match fields.get(name)? {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.parse::<u64>().ok()?,
        _ => return None,
    };
    u16::try_from(raw).ok()
}
