use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

pub type CatalogItemId = Uuid;

/// Color assigned to new catalog items when none is picked.
pub const DEFAULT_COLOR: &str = "#808080";

/// A hex color tag (`#RGB` or `#RRGGBB`), stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(String);

impl Color {
    pub fn parse(input: &str) -> Result<Self, ColorError> {
        let input = input.trim();
        let hex = input
            .strip_prefix('#')
            .ok_or_else(|| ColorError(input.to_string()))?;

        if !matches!(hex.len(), 3 | 6) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorError(input.to_string()));
        }

        Ok(Self(format!("#{}", hex.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Color {
    fn default() -> Self {
        Self(DEFAULT_COLOR.to_string())
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Color {
    type Error = ColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::parse(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorError(pub String);

impl std::fmt::Display for ColorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid color '{}', expected #RGB or #RRGGBB", self.0)
    }
}

impl std::error::Error for ColorError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogItemKind {
    /// A product that can be withdrawn
    Input,
    /// A payment shortcut
    #[serde(alias = "entrego")]
    Payment,
}

impl CatalogItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogItemKind::Input => "input",
            CatalogItemKind::Payment => "payment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "input" => Some(CatalogItemKind::Input),
            "payment" | "entrego" => Some(CatalogItemKind::Payment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    #[serde(deserialize_with = "deserialize_item_id")]
    pub id: CatalogItemId,
    #[serde(alias = "input")]
    pub label: String,
    pub color: Color,
    #[serde(alias = "tipo")]
    pub kind: CatalogItemKind,
}

/// Older catalog documents use arbitrary string ids; those get a fresh UUID.
fn deserialize_item_id<'de, D>(deserializer: D) -> Result<CatalogItemId, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(Uuid::parse_str(&raw).unwrap_or_else(|_| Uuid::new_v4()))
}

impl CatalogItem {
    pub fn new(label: impl Into<String>, color: Color) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            color,
            kind: CatalogItemKind::Input,
        }
    }
}

/// The ordered product catalog. Position in `items` is the display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    items: Vec<CatalogItem>,
}

impl Catalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<CatalogItem> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: CatalogItemId) -> Option<&CatalogItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn position(&self, id: CatalogItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    /// Case-insensitive lookup by label.
    pub fn find_by_label(&self, label: &str) -> Option<&CatalogItem> {
        let label = label.trim();
        self.items
            .iter()
            .find(|item| item.label.eq_ignore_ascii_case(label))
    }

    /// Append a product item and return it.
    pub fn add(&mut self, label: impl Into<String>, color: Color) -> &CatalogItem {
        self.items.push(CatalogItem::new(label, color));
        &self.items[self.items.len() - 1]
    }

    /// Replace label and color of an item. A blank label keeps the old one.
    /// Returns false when no item has the given id.
    pub fn update(&mut self, id: CatalogItemId, label: &str, color: Color) -> bool {
        let Some(item) = self.items.iter_mut().find(|item| item.id == id) else {
            return false;
        };
        if !label.trim().is_empty() {
            item.label = label.trim().to_string();
        }
        item.color = color;
        true
    }

    pub fn remove(&mut self, id: CatalogItemId) -> Option<CatalogItem> {
        let index = self.position(id)?;
        Some(self.items.remove(index))
    }

    /// Move the item at `from` to index `to`.
    /// Out-of-range indices leave the catalog untouched and return false.
    pub fn move_item(&mut self, from: usize, to: usize) -> bool {
        if from >= self.items.len() || to >= self.items.len() {
            return false;
        }
        let item = self.items.remove(from);
        self.items.insert(to, item);
        true
    }

    pub fn move_up(&mut self, id: CatalogItemId) -> bool {
        match self.position(id) {
            Some(index) if index > 0 => self.move_item(index, index - 1),
            _ => false,
        }
    }

    pub fn move_down(&mut self, id: CatalogItemId) -> bool {
        match self.position(id) {
            Some(index) => self.move_item(index, index + 1),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color(s: &str) -> Color {
        Color::parse(s).unwrap()
    }

    fn labels(catalog: &Catalog) -> Vec<&str> {
        catalog.items().iter().map(|i| i.label.as_str()).collect()
    }

    fn sample_catalog() -> Catalog {
        let mut catalog = Catalog::default();
        catalog.add("Soda", color("#ff0000"));
        catalog.add("Water", color("#00f"));
        catalog.add("Beer", Color::default());
        catalog
    }

    #[test]
    fn test_color_parse() {
        assert_eq!(color("#FFAA00").as_str(), "#ffaa00");
        assert_eq!(color(" #abc ").as_str(), "#abc");
        assert!(Color::parse("ffaa00").is_err());
        assert!(Color::parse("#ffaa0").is_err());
        assert!(Color::parse("#gggggg").is_err());
        assert_eq!(Color::default().as_str(), DEFAULT_COLOR);
    }

    #[test]
    fn test_color_serde_validates() {
        let ok: Color = serde_json::from_str("\"#123456\"").unwrap();
        assert_eq!(ok.as_str(), "#123456");
        assert!(serde_json::from_str::<Color>("\"red\"").is_err());
    }

    #[test]
    fn test_item_accepts_legacy_fields() {
        let item: CatalogItem = serde_json::from_str(
            r##"{"id": "0.4821", "input": "Soda", "color": "#FF0000", "tipo": "input"}"##,
        )
        .unwrap();
        assert_eq!(item.label, "Soda");
        assert_eq!(item.color.as_str(), "#ff0000");
        assert_eq!(item.kind, CatalogItemKind::Input);
        assert!(!item.id.is_nil());

        let id = Uuid::new_v4();
        let json = format!(r##"{{"id": "{id}", "label": "Water", "color": "#00f", "kind": "input"}}"##);
        let item: CatalogItem = serde_json::from_str(&json).unwrap();
        assert_eq!(item.id, id);
    }

    #[test]
    fn test_add_appends_input_items() {
        let catalog = sample_catalog();
        assert_eq!(labels(&catalog), vec!["Soda", "Water", "Beer"]);
        assert!(catalog
            .items()
            .iter()
            .all(|i| i.kind == CatalogItemKind::Input));
    }

    #[test]
    fn test_update_keeps_label_when_blank() {
        let mut catalog = sample_catalog();
        let id = catalog.items()[0].id;

        assert!(catalog.update(id, "  ", color("#000000")));
        let item = catalog.get(id).unwrap();
        assert_eq!(item.label, "Soda");
        assert_eq!(item.color.as_str(), "#000000");

        assert!(catalog.update(id, "Cola", color("#111111")));
        assert_eq!(catalog.get(id).unwrap().label, "Cola");

        assert!(!catalog.update(Uuid::new_v4(), "Nope", Color::default()));
    }

    #[test]
    fn test_remove() {
        let mut catalog = sample_catalog();
        let id = catalog.items()[1].id;

        let removed = catalog.remove(id).unwrap();
        assert_eq!(removed.label, "Water");
        assert_eq!(labels(&catalog), vec!["Soda", "Beer"]);
        assert!(catalog.remove(id).is_none());
    }

    #[test]
    fn test_move_item() {
        let mut catalog = sample_catalog();

        assert!(catalog.move_item(0, 2));
        assert_eq!(labels(&catalog), vec!["Water", "Beer", "Soda"]);

        assert!(!catalog.move_item(0, 3));
        assert!(!catalog.move_item(5, 0));
        assert_eq!(labels(&catalog), vec!["Water", "Beer", "Soda"]);
    }

    #[test]
    fn test_move_up_and_down_at_edges() {
        let mut catalog = sample_catalog();
        let first = catalog.items()[0].id;
        let last = catalog.items()[2].id;

        assert!(!catalog.move_up(first));
        assert!(!catalog.move_down(last));
        assert!(catalog.move_down(first));
        assert_eq!(labels(&catalog), vec!["Water", "Soda", "Beer"]);
        assert!(catalog.move_up(last));
        assert_eq!(labels(&catalog), vec!["Water", "Beer", "Soda"]);
    }

    #[test]
    fn test_find_by_label_ignores_case() {
        let catalog = sample_catalog();
        assert_eq!(catalog.find_by_label("water").unwrap().label, "Water");
        assert!(catalog.find_by_label("juice").is_none());
    }
}
