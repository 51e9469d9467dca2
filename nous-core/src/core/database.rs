//! Typed table content of database pages, stored in
//! `files/<pageId>.database` next to the page.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use uuid::Uuid;

use crate::core::resolve::{resolve, Named};
use crate::{NousError, Result};

/// Current `.database` format version.
pub const DATABASE_VERSION: u32 = 2;

/// Palette assigned to select options in creation order.
pub const OPTION_COLORS: [&str; 10] = [
    "#ef4444", "#f97316", "#eab308", "#22c55e", "#06b6d4", "#3b82f6", "#8b5cf6", "#ec4899",
    "#6b7280", "#a855f7",
];

fn option_color(index: usize) -> String {
    OPTION_COLORS[index % OPTION_COLORS.len()].to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyType {
    Text,
    Number,
    Select,
    MultiSelect,
    Checkbox,
    Date,
    Url,
}

impl PropertyType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Select => "select",
            Self::MultiSelect => "multiSelect",
            Self::Checkbox => "checkbox",
            Self::Date => "date",
            Self::Url => "url",
        }
    }

    pub fn has_options(self) -> bool {
        matches!(self, Self::Select | Self::MultiSelect)
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub id: String,
    pub label: String,
    pub color: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SelectOption {
    fn new(label: impl Into<String>, color: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            label: label.into(),
            color,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<SelectOption>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Named for PropertyDef {
    const KIND: &'static str = "Property";

    fn name(&self) -> &str {
        &self.name
    }

    fn uuid(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.id).ok()
    }
}

/// A stored cell. Select cells hold option ids; multi-select cells hold
/// lists of option ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Bool(bool),
    Number(Number),
    Text(String),
    List(Vec<String>),
    /// Anything else the application stored (null, objects, mixed arrays).
    Other(Value),
}

impl From<Value> for CellValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::Text(s),
            Value::Array(items) if items.iter().all(Value::is_string) => Self::List(
                items
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
            ),
            other => Self::Other(other),
        }
    }
}

impl PropertyDef {
    fn options_mut(&mut self) -> &mut Vec<SelectOption> {
        self.options.get_or_insert_with(Vec::new)
    }

    /// Finds an option by label ignoring case, creating it when missing.
    /// New options take the palette colour at the current option count.
    fn option_id_for(&mut self, label: &str) -> String {
        let options = self.options_mut();
        let wanted = label.to_lowercase();
        if let Some(opt) = options.iter().find(|o| o.label.to_lowercase() == wanted) {
            return opt.id.clone();
        }
        let opt = SelectOption::new(label, option_color(options.len()));
        let id = opt.id.clone();
        options.push(opt);
        id
    }

    /// Converts a caller-supplied value into its stored form: select labels
    /// become option ids (auto-creating unknown options), everything else is
    /// kept as given.
    ///
    /// # Errors
    ///
    /// Returns [`NousError::InvalidInput`] when a select or multi-select
    /// value is neither a label, a list of labels nor `null`.
    pub fn resolve_input(&mut self, value: Value) -> Result<CellValue> {
        let cell = match (self.property_type, value) {
            (PropertyType::Select | PropertyType::MultiSelect, Value::Null) => {
                CellValue::Other(Value::Null)
            }
            (PropertyType::Select, Value::String(label)) => {
                CellValue::Text(self.option_id_for(&label))
            }
            (PropertyType::MultiSelect, Value::String(label)) => {
                CellValue::List(vec![self.option_id_for(&label)])
            }
            (PropertyType::MultiSelect, Value::Array(labels))
                if labels.iter().all(Value::is_string) =>
            {
                CellValue::List(
                    labels
                        .iter()
                        .filter_map(Value::as_str)
                        .map(|label| self.option_id_for(label))
                        .collect(),
                )
            }
            (PropertyType::Select | PropertyType::MultiSelect, other) => {
                return Err(NousError::InvalidInput(format!(
                    "property '{}' takes option labels, got {other}",
                    self.name
                )));
            }
            (_, value) => CellValue::from(value),
        };
        Ok(cell)
    }

    fn option_label<'a>(&'a self, id: &'a str) -> &'a str {
        self.options
            .iter()
            .flatten()
            .find(|o| o.id == id)
            .map(|o| o.label.as_str())
            .unwrap_or(id)
    }

    /// Human-readable form of a stored cell: option ids become labels,
    /// multi-select labels are comma-joined, booleans are lowercase.
    pub fn display(&self, cell: Option<&CellValue>) -> String {
        match cell {
            None | Some(CellValue::Other(Value::Null)) => String::new(),
            Some(CellValue::Text(s)) if self.property_type == PropertyType::Select => {
                self.option_label(s).to_string()
            }
            Some(CellValue::Text(s)) => s.clone(),
            Some(CellValue::List(ids)) => ids
                .iter()
                .map(|id| self.option_label(id))
                .collect::<Vec<_>>()
                .join(", "),
            Some(CellValue::Bool(b)) => b.to_string(),
            Some(CellValue::Number(n)) => n.to_string(),
            Some(CellValue::Other(v)) => v.to_string(),
        }
    }
}

/// Caller-facing description of a property to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySpec {
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(default)]
    pub options: Vec<String>,
}

/// Builds property definitions with fresh ids. Option colours continue
/// through the palette across all properties.
pub fn build_properties(specs: &[PropertySpec]) -> Result<Vec<PropertyDef>> {
    let mut color_index = 0;
    let mut props: Vec<PropertyDef> = Vec::with_capacity(specs.len());
    for spec in specs {
        let name = spec.name.trim();
        if name.is_empty() {
            return Err(NousError::InvalidInput("property name must not be empty".into()));
        }
        if props.iter().any(|p| p.name.eq_ignore_ascii_case(name)) {
            return Err(NousError::InvalidInput(format!("duplicate property '{name}'")));
        }
        let options = spec.property_type.has_options().then(|| {
            spec.options
                .iter()
                .map(|label| {
                    let opt = SelectOption::new(label.clone(), option_color(color_index));
                    color_index += 1;
                    opt
                })
                .collect()
        });
        props.push(PropertyDef {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            property_type: spec.property_type,
            options,
            extra: Map::new(),
        });
    }
    Ok(props)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub id: String,
    /// Keyed by property id.
    #[serde(default)]
    pub cells: BTreeMap<String, CellValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Row {
    pub fn new(cells: BTreeMap<String, CellValue>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            cells,
            created_at: now,
            updated_at: now,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewDef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default = "default_view_type")]
    pub view_type: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_view_type() -> String {
    "table".to_string()
}

impl ViewDef {
    pub fn table() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: "Table".to_string(),
            view_type: default_view_type(),
            extra: Map::new(),
        }
    }
}

/// Contents of a `.database` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseContent {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub views: Vec<ViewDef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_version() -> u32 {
    DATABASE_VERSION
}

/// Identifies a row by id or by 0-based position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowRef {
    Index(usize),
    Id(String),
}

/// Cells to merge into one existing row, keyed by property name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowUpdate {
    pub row: RowRef,
    pub cells: Map<String, Value>,
}

impl DatabaseContent {
    /// New table with one default table view and no rows.
    pub fn new(properties: Vec<PropertyDef>) -> Self {
        Self {
            version: DATABASE_VERSION,
            properties,
            rows: Vec::new(),
            views: vec![ViewDef::table()],
            extra: Map::new(),
        }
    }

    /// Resolves `input` keyed by property name (or id) into stored cells
    /// keyed by property id. Select options are created on the way.
    ///
    /// # Errors
    ///
    /// Returns [`NousError::NotFound`] or [`NousError::Ambiguous`] for a
    /// property name that does not resolve, and [`NousError::InvalidInput`]
    /// for a select value that is not a label.
    pub fn resolve_cells(&mut self, input: &Map<String, Value>) -> Result<BTreeMap<String, CellValue>> {
        let mut cells = BTreeMap::new();
        for (name, value) in input {
            let index = self.property_index(name)?;
            let prop = &mut self.properties[index];
            let cell = prop.resolve_input(value.clone())?;
            cells.insert(prop.id.clone(), cell);
        }
        Ok(cells)
    }

    fn property_index(&self, name: &str) -> Result<usize> {
        if let Some(i) = self.properties.iter().position(|p| p.id == name) {
            return Ok(i);
        }
        let id = resolve(name, &self.properties)?.id.clone();
        self.properties
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| NousError::not_found("Property", name))
    }

    /// Appends rows built from name-keyed cell maps. Returns the new row ids.
    pub fn add_rows(&mut self, rows: &[Map<String, Value>]) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(rows.len());
        for input in rows {
            let row = Row::new(self.resolve_cells(input)?);
            ids.push(row.id.clone());
            self.rows.push(row);
        }
        Ok(ids)
    }

    pub fn row_index(&self, row: &RowRef) -> Result<usize> {
        match row {
            RowRef::Index(i) if *i < self.rows.len() => Ok(*i),
            RowRef::Index(i) => Err(NousError::not_found("Row", i.to_string())),
            RowRef::Id(id) => self
                .rows
                .iter()
                .position(|r| r.id == *id)
                .ok_or_else(|| NousError::not_found("Row", id.clone())),
        }
    }

    /// Merges name-keyed cells into an existing row and bumps its `updatedAt`.
    pub fn update_row(&mut self, row: &RowRef, input: &Map<String, Value>) -> Result<()> {
        let index = self.row_index(row)?;
        let cells = self.resolve_cells(input)?;
        let row = &mut self.rows[index];
        row.cells.extend(cells);
        let now = Utc::now();
        if now > row.updated_at {
            row.updated_at = now;
        }
        Ok(())
    }

    /// Markdown table of the rows with a front-matter header. Cells show
    /// option labels and escape `|`.
    pub fn to_markdown(&self, title: &str) -> String {
        let summary = self
            .properties
            .iter()
            .map(|p| format!("{} ({})", p.name, p.property_type))
            .collect::<Vec<_>>()
            .join(", ");
        let mut lines = vec![
            "---".to_string(),
            format!("title: {title}"),
            format!("properties: {summary}"),
            format!("rows: {}", self.rows.len()),
            "---".to_string(),
            String::new(),
        ];

        if self.properties.is_empty() {
            lines.push("(no properties defined)".to_string());
            return lines.join("\n");
        }

        let headers: Vec<&str> = self.properties.iter().map(|p| p.name.as_str()).collect();
        lines.push(format!("| {} |", headers.join(" | ")));
        lines.push(format!("|{}|", vec!["---"; headers.len()].join("|")));
        for row in &self.rows {
            let values: Vec<String> = self
                .properties
                .iter()
                .map(|p| p.display(row.cells.get(&p.id)).replace('|', "\\|"))
                .collect();
            lines.push(format!("| {} |", values.join(" | ")));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn specs(value: Value) -> Vec<PropertySpec> {
        serde_json::from_value(value).unwrap()
    }

    fn sample() -> DatabaseContent {
        let props = build_properties(&specs(json!([
            {"name": "Name", "type": "text"},
            {"name": "Status", "type": "select", "options": ["Todo", "Done"]},
            {"name": "Labels", "type": "multiSelect", "options": ["red"]},
            {"name": "Done", "type": "checkbox"}
        ])))
        .unwrap();
        DatabaseContent::new(props)
    }

    #[test]
    fn test_build_properties_assigns_palette_across_properties() {
        let db = sample();
        let status = db.properties[1].options.as_ref().unwrap();
        assert_eq!(status[0].color, OPTION_COLORS[0]);
        assert_eq!(status[1].color, OPTION_COLORS[1]);
        let labels = db.properties[2].options.as_ref().unwrap();
        assert_eq!(labels[0].color, OPTION_COLORS[2]);
        assert!(db.properties[0].options.is_none());
        assert_eq!(db.views.len(), 1);
    }

    #[test]
    fn test_build_properties_rejects_duplicates() {
        let err = build_properties(&specs(json!([
            {"name": "A", "type": "text"},
            {"name": "a", "type": "number"}
        ])))
        .unwrap_err();
        assert!(matches!(err, NousError::InvalidInput(_)));
    }

    #[test]
    fn test_select_label_resolves_to_existing_option_ignoring_case() {
        let mut db = sample();
        let done_id = db.properties[1].options.as_ref().unwrap()[1].id.clone();
        let input = json!({"Status": "done"});
        let cells = db.resolve_cells(input.as_object().unwrap()).unwrap();
        assert_eq!(cells[&db.properties[1].id], CellValue::Text(done_id));
        assert_eq!(db.properties[1].options.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_labels_auto_create_options() {
        let mut db = sample();
        let input = json!({"stat": "Blocked", "Labels": ["Red", "blue"]});
        let cells = db.resolve_cells(input.as_object().unwrap()).unwrap();

        let status = &db.properties[1];
        let opts = status.options.as_ref().unwrap();
        assert_eq!(opts.len(), 3);
        assert_eq!(opts[2].label, "Blocked");
        assert_eq!(opts[2].color, OPTION_COLORS[2]);
        assert_eq!(cells[&status.id], CellValue::Text(opts[2].id.clone()));

        let labels = &db.properties[2];
        let opts = labels.options.as_ref().unwrap();
        assert_eq!(opts.len(), 2);
        assert_eq!(
            cells[&labels.id],
            CellValue::List(vec![opts[0].id.clone(), opts[1].id.clone()])
        );
    }

    #[test]
    fn test_unknown_property_is_not_found() {
        let mut db = sample();
        let input = json!({"Priority": 1});
        let err = db.resolve_cells(input.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, NousError::NotFound { kind: "Property", .. }));
    }

    #[test]
    fn test_add_and_update_rows() {
        let mut db = sample();
        let rows = vec![json!({"Name": "Write docs", "Status": "Todo", "Done": false})
            .as_object()
            .unwrap()
            .clone()];
        let ids = db.add_rows(&rows).unwrap();
        assert_eq!(db.rows.len(), 1);

        let update = json!({"Done": true});
        db.update_row(&RowRef::Id(ids[0].clone()), update.as_object().unwrap())
            .unwrap();
        let done_prop = db.properties[3].id.clone();
        assert_eq!(db.rows[0].cells[&done_prop], CellValue::Bool(true));
        assert_eq!(db.rows[0].cells.len(), 3);

        assert!(db.update_row(&RowRef::Index(5), update.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_to_markdown_shows_labels_and_escapes_pipes() {
        let mut db = sample();
        let rows = vec![json!({"Name": "a|b", "Status": "Done", "Labels": ["red"], "Done": true})
            .as_object()
            .unwrap()
            .clone()];
        db.add_rows(&rows).unwrap();
        let md = db.to_markdown("Tasks");
        assert!(md.starts_with("---\ntitle: Tasks\n"));
        assert!(md.contains("properties: Name (text), Status (select), Labels (multiSelect), Done (checkbox)"));
        assert!(md.contains("rows: 1"));
        assert!(md.contains("| Name | Status | Labels | Done |"));
        assert!(md.contains("|---|---|---|---|"));
        assert!(md.contains("| a\\|b | Done | red | true |"));
    }

    #[test]
    fn test_to_markdown_without_properties() {
        let md = DatabaseContent::new(vec![]).to_markdown("Empty");
        assert!(md.ends_with("(no properties defined)"));
    }

    #[test]
    fn test_database_file_keeps_unknown_fields() {
        let raw = json!({
            "version": 2,
            "properties": [{"id": "p1", "name": "Title", "type": "text", "width": 200}],
            "rows": [{"id": "r1", "cells": {"p1": "x", "p2": null},
                      "createdAt": "2026-01-01T00:00:00Z", "updatedAt": "2026-01-01T00:00:00Z"}],
            "views": [{"id": "v1", "name": "Board", "type": "board", "groupBy": "p1"}],
            "defaultViewId": "v1"
        });
        let db: DatabaseContent = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(db.properties[0].extra["width"], 200);
        assert_eq!(db.rows[0].cells["p2"], CellValue::Other(Value::Null));
        assert_eq!(serde_json::to_value(&db).unwrap(), raw);
    }

    #[test]
    fn test_select_rejects_non_label_values() {
        let mut db = sample();
        let stage = json!({"Status": 7}).as_object().unwrap().clone();
        assert!(matches!(db.add_rows(&[stage]), Err(NousError::InvalidInput(_))));
        let mixed = json!({"Labels": [1, "a"]}).as_object().unwrap().clone();
        assert!(matches!(db.add_rows(&[mixed]), Err(NousError::InvalidInput(_))));
        assert_eq!(db.properties[2].options.as_ref().unwrap().len(), 1);

        let cleared = json!({"Status": null, "Labels": null}).as_object().unwrap().clone();
        db.add_rows(&[cleared]).unwrap();
        let row = &db.rows[db.rows.len() - 1];
        assert_eq!(row.cells[&db.properties[1].id], CellValue::Other(Value::Null));
    }
}
