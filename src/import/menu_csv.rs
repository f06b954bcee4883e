//! Menu CSV Import
//!
//! Header row with required columns `name, price, category` and optional
//! `description, isAvailable, tags`. Column names are matched
//! case-insensitively. Rows missing a required value are dropped.

use super::ImportError;
use crate::store::Fields;
use crate::validation::validate_price;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// A menu item ready to be written to a tenant's `menu` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub name: String,
    pub price: f64,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_available")]
    pub is_available: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_available() -> bool {
    true
}

impl MenuItem {
    /// Document fields for this item
    pub fn to_fields(&self) -> Fields {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Fields::new(),
        }
    }
}

/// Result of a menu import
#[derive(Debug, Default)]
pub struct MenuImportResult {
    pub items: Vec<MenuItem>,
    pub rows_processed: usize,
    pub rows_skipped: usize,
}

/// Column positions resolved from the header row
struct Columns {
    name: usize,
    price: usize,
    category: usize,
    description: Option<usize>,
    is_available: Option<usize>,
    tags: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, ImportError> {
        if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
            return Err(ImportError::Empty);
        }

        let index: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, h)| (normalize_header(h), idx))
            .collect();

        let required = |name: &str| {
            index
                .get(name)
                .copied()
                .ok_or_else(|| ImportError::MissingColumn(name.to_string()))
        };
        let optional = |names: &[&str]| names.iter().find_map(|n| index.get(*n).copied());

        Ok(Self {
            name: required("name")?,
            price: required("price")?,
            category: required("category")?,
            description: optional(&["description"]),
            is_available: optional(&["isavailable", "available"]),
            tags: optional(&["tags"]),
        })
    }
}

/// `isAvailable`, `is_available`, ` Is Available ` → `isavailable`
fn normalize_header(header: &str) -> String {
    header
        .trim()
        .chars()
        .filter(|c| !matches!(c, '_' | ' ' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// `true`, `yes`, `1` in any case; an empty cell keeps the default
fn parse_available(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None | Some("") => true,
        Some(v) => matches!(v.to_lowercase().as_str(), "true" | "yes" | "1"),
    }
}

fn parse_tags(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(';')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// CSV importer for menu items
#[derive(Debug, Clone, Default)]
pub struct MenuCsvImporter {
    /// Default category for rows with an empty category cell
    default_category: Option<String>,
}

impl MenuCsvImporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill empty category cells instead of dropping the row
    pub fn with_default_category(mut self, category: &str) -> Self {
        self.default_category = Some(category.to_string());
        self
    }

    /// Import from a CSV file
    pub fn import(&self, path: &Path) -> Result<MenuImportResult, ImportError> {
        let file = std::fs::File::open(path)?;
        self.import_reader(file)
    }

    /// Import from a CSV string
    pub fn import_str(&self, csv_data: &str) -> Result<MenuImportResult, ImportError> {
        self.import_reader(csv_data.as_bytes())
    }

    pub fn import_reader<R: Read>(&self, reader: R) -> Result<MenuImportResult, ImportError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns = Columns::from_headers(reader.headers()?)?;
        let mut result = MenuImportResult::default();

        for (line_num, record) in reader.records().enumerate() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!(line = line_num + 2, error = %e, "Unreadable menu row skipped");
                    result.rows_skipped += 1;
                    continue;
                }
            };

            match self.parse_row(&record, &columns) {
                Some(item) => {
                    result.items.push(item);
                    result.rows_processed += 1;
                }
                None => {
                    tracing::debug!(line = line_num + 2, "Incomplete menu row skipped");
                    result.rows_skipped += 1;
                }
            }
        }

        Ok(result)
    }

    fn parse_row(&self, record: &csv::StringRecord, columns: &Columns) -> Option<MenuItem> {
        let cell = |idx: Option<usize>| idx.and_then(|i| record.get(i)).map(str::trim);

        let name = cell(Some(columns.name)).filter(|s| !s.is_empty())?;
        let price = cell(Some(columns.price))
            .filter(|s| !s.is_empty())?
            .parse::<f64>()
            .ok()
            .filter(|p| validate_price(*p).is_ok())?;
        let category = cell(Some(columns.category))
            .filter(|s| !s.is_empty())
            .or(self.default_category.as_deref())?;

        Some(MenuItem {
            name: name.to_string(),
            price,
            category: category.to_string(),
            description: cell(columns.description).unwrap_or_default().to_string(),
            is_available: parse_available(cell(columns.is_available)),
            tags: parse_tags(cell(columns.tags)),
        })
    }
}

/// Split one CSV line into fields
///
/// Double-quoted fields may contain commas, and `""` inside quotes is a
/// literal quote. Whitespace is preserved.
pub fn split_csv_line(line: &str) -> Result<Vec<String>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());

    let mut record = csv::StringRecord::new();
    if !reader.read_record(&mut record)? {
        return Ok(Vec::new());
    }

    Ok(record.iter().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_row_defaults() {
        let result = MenuCsvImporter::new()
            .import_str("name,price,category\nBurger,9.99,Entrees")
            .unwrap();

        assert_eq!(result.rows_processed, 1);
        assert_eq!(
            result.items,
            vec![MenuItem {
                name: "Burger".to_string(),
                price: 9.99,
                category: "Entrees".to_string(),
                description: String::new(),
                is_available: true,
                tags: vec![],
            }]
        );
    }

    #[test]
    fn test_rows_missing_required_values_are_dropped() {
        let csv_data = "name,price,category
Burger,9.99,Entrees
,4.50,Sides
Fries,,Sides
Shake,3.00,
Soda,abc,Drinks
Salad,7.25,Starters";

        let result = MenuCsvImporter::new().import_str(csv_data).unwrap();

        let names: Vec<&str> = result.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Burger", "Salad"]);
        assert_eq!(result.rows_skipped, 4);
    }

    #[test]
    fn test_tags_split_on_semicolons() {
        let csv_data = "name,price,category,tags\nWings,11,Starters,\"a;b;c\"\nNachos,8,Starters, spicy ; ;vegan ";
        let result = MenuCsvImporter::new().import_str(csv_data).unwrap();

        assert_eq!(result.items[0].tags, vec!["a", "b", "c"]);
        assert_eq!(result.items[1].tags, vec!["spicy", "vegan"]);
    }

    #[test]
    fn test_availability_normalization() {
        let csv_data = "name,price,category,isAvailable
A,1,X,true
B,1,X,yes
C,1,X,1
D,1,X,TRUE
E,1,X,no
F,1,X,0
G,1,X,";
        let result = MenuCsvImporter::new().import_str(csv_data).unwrap();
        let flags: Vec<bool> = result.items.iter().map(|i| i.is_available).collect();
        assert_eq!(flags, vec![true, true, true, true, false, false, true]);
    }

    #[test]
    fn test_headers_case_insensitive_with_description() {
        let csv_data = "Name, Price ,CATEGORY,Description,is_available\n\"Soup, tomato\",5.5,Starters,\"House \"\"special\"\"\",Yes";
        let result = MenuCsvImporter::new().import_str(csv_data).unwrap();

        let item = &result.items[0];
        assert_eq!(item.name, "Soup, tomato");
        assert_eq!(item.description, "House \"special\"");
        assert!(item.is_available);
    }

    #[test]
    fn test_missing_required_column() {
        let err = MenuCsvImporter::new()
            .import_str("name,category\nBurger,Entrees")
            .unwrap_err();
        assert!(matches!(err, ImportError::MissingColumn(ref c) if c == "price"));
    }

    #[test]
    fn test_default_category() {
        let result = MenuCsvImporter::new()
            .with_default_category("Uncategorized")
            .import_str("name,price,category\nTea,2,")
            .unwrap();
        assert_eq!(result.items[0].category, "Uncategorized");
    }

    #[test]
    fn test_to_fields_uses_camel_case() {
        let item = MenuItem {
            name: "Tea".to_string(),
            price: 2.0,
            category: "Drinks".to_string(),
            description: String::new(),
            is_available: false,
            tags: vec!["hot".to_string()],
        };
        let fields = item.to_fields();
        assert_eq!(fields["isAvailable"], serde_json::json!(false));
        assert_eq!(fields["tags"], serde_json::json!(["hot"]));
    }

    #[test]
    fn test_split_escaped_quote() {
        let fields = split_csv_line(r#"a,"say ""hi""",c"#).unwrap();
        assert_eq!(fields, vec!["a", "say \"hi\"", "c"]);

        let fields = split_csv_line(r#""""""#).unwrap();
        assert_eq!(fields, vec!["\""]);
    }

    #[test]
    fn test_split_quoted_comma_and_empty_fields() {
        let fields = split_csv_line(r#""Smith, Jo",,x"#).unwrap();
        assert_eq!(fields, vec!["Smith, Jo", "", "x"]);
        assert!(split_csv_line("").unwrap().is_empty());
    }
}
