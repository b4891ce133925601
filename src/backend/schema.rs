//! SQL schema derivation for plan data models

use crate::plan::{DataModel, ModelProperty};

const OWNER_COLUMNS: [&str; 2] = ["user_id", "owner_id"];

/// `MealEntry` -> `meal_entry`, `userID` -> `user_id`
pub fn snake_case(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let boundary = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_lower);
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }
    out.trim_end_matches('_').to_string()
}

fn pluralize(word: &str) -> String {
    if word.ends_with('s') || word.ends_with('x') || word.ends_with("ch") || word.ends_with("sh") {
        return format!("{}es", word);
    }
    if let Some(stem) = word.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{}ies", stem);
        }
    }
    format!("{}s", word)
}

pub fn table_name(model: &str) -> String {
    pluralize(&snake_case(model))
}

fn sql_type(property_type: &str) -> &'static str {
    let base = property_type.trim().trim_end_matches('?');
    match base {
        "String" | "Character" | "URL" => "text",
        "Int" | "Int64" | "Int32" | "UInt" => "bigint",
        "Double" | "Float" | "CGFloat" | "Decimal" => "double precision",
        "Bool" => "boolean",
        "Date" => "timestamptz",
        "UUID" => "uuid",
        "Data" => "bytea",
        _ => "jsonb",
    }
}

fn sql_literal(value: &str, sql_type: &str) -> String {
    let is_numeric = value.parse::<f64>().is_ok();
    match sql_type {
        "bigint" | "double precision" if is_numeric => value.to_string(),
        "boolean" if value == "true" || value == "false" => value.to_string(),
        _ => format!("'{}'", value.trim_matches('"').replace('\'', "''")),
    }
}

fn column(property: &ModelProperty) -> (String, String) {
    let name = snake_case(&property.name);
    let optional = property.property_type.trim().ends_with('?');
    let ty = if OWNER_COLUMNS.contains(&name.as_str()) {
        "uuid"
    } else {
        sql_type(&property.property_type)
    };

    let mut def = format!("{} {}", name, ty);
    if !optional {
        def.push_str(" not null");
    }
    if let Some(default) = &property.default_value {
        def.push_str(&format!(" default {}", sql_literal(default, ty)));
    }
    (name, def)
}

fn primary_key(property: &ModelProperty) -> String {
    match sql_type(&property.property_type) {
        "uuid" => "id uuid primary key default gen_random_uuid()".to_string(),
        "bigint" => "id bigint generated by default as identity primary key".to_string(),
        ty => format!("id {} primary key", ty),
    }
}

/// Idempotent statements for one model: table, RLS, and owner policy
pub fn model_statements(model: &DataModel) -> Vec<String> {
    let table = table_name(&model.name);
    let mut props = model.properties.iter().peekable();

    let mut columns = Vec::new();
    match props.peek() {
        Some(first) if first.name.eq_ignore_ascii_case("id") => {
            columns.push(primary_key(first));
            props.next();
        }
        _ => columns.push("id uuid primary key default gen_random_uuid()".to_string()),
    }

    let mut owner = None;
    for property in props {
        let (name, def) = column(property);
        if name == "id" || columns.iter().any(|c| c.starts_with(&format!("{} ", name))) {
            continue;
        }
        if owner.is_none() && OWNER_COLUMNS.contains(&name.as_str()) {
            owner = Some(name);
        }
        columns.push(def);
    }

    let mut statements = vec![
        format!(
            "create table if not exists public.{} (\n  {}\n);",
            table,
            columns.join(",\n  ")
        ),
        format!("alter table public.{} enable row level security;", table),
    ];
    if let Some(owner) = owner {
        let policy = format!("{}_owner", table);
        statements.push(format!(
            "drop policy if exists \"{}\" on public.{};",
            policy, table
        ));
        statements.push(format!(
            "create policy \"{}\" on public.{} for all using (auth.uid() = {}) with check (auth.uid() = {});",
            policy, table, owner, owner
        ));
    }
    statements
}

/// Statements for every model, in plan order
pub fn schema_statements(models: &[DataModel]) -> Vec<String> {
    models.iter().flat_map(model_statements).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop(name: &str, ty: &str) -> ModelProperty {
        ModelProperty {
            name: name.to_string(),
            property_type: ty.to_string(),
            default_value: None,
        }
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("MealEntry"), "meal_entry");
        assert_eq!(snake_case("userID"), "user_id");
        assert_eq!(snake_case("URLString"), "url_string");
        assert_eq!(snake_case("createdAt"), "created_at");
        assert_eq!(snake_case("calories2Day"), "calories2_day");
    }

    #[test]
    fn test_table_names() {
        assert_eq!(table_name("Meal"), "meals");
        assert_eq!(table_name("Category"), "categories");
        assert_eq!(table_name("Day"), "days");
        assert_eq!(table_name("Box"), "boxes");
    }

    #[test]
    fn test_leading_id_becomes_primary_key() {
        let model = DataModel {
            name: "Meal".to_string(),
            storage: "remote".to_string(),
            properties: vec![
                prop("id", "UUID"),
                prop("name", "String"),
                prop("notes", "String?"),
                prop("calories", "Int"),
            ],
        };
        let stmts = model_statements(&model);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].starts_with("create table if not exists public.meals ("));
        assert!(stmts[0].contains("id uuid primary key default gen_random_uuid()"));
        assert!(stmts[0].contains("name text not null"));
        assert!(stmts[0].contains("notes text,") || stmts[0].contains("notes text\n"));
        assert_eq!(stmts[1], "alter table public.meals enable row level security;");
    }

    #[test]
    fn test_owner_policy_and_synthetic_id() {
        let mut calories = prop("calories", "Int");
        calories.default_value = Some("0".to_string());
        let model = DataModel {
            name: "MealLog".to_string(),
            storage: String::new(),
            properties: vec![prop("userID", "String"), calories, prop("tags", "[String]")],
        };
        let stmts = model_statements(&model);
        assert!(stmts[0].contains("id uuid primary key default gen_random_uuid()"));
        assert!(stmts[0].contains("user_id uuid not null"));
        assert!(stmts[0].contains("calories bigint not null default 0"));
        assert!(stmts[0].contains("tags jsonb not null"));
        assert_eq!(
            stmts[2],
            "drop policy if exists \"meal_logs_owner\" on public.meal_logs;"
        );
        assert!(stmts[3].contains("using (auth.uid() = user_id)"));
    }

    #[test]
    fn test_statements_are_rerunnable() {
        let model = DataModel {
            name: "Note".to_string(),
            storage: String::new(),
            properties: vec![prop("ownerId", "UUID")],
        };
        for stmt in schema_statements(&[model]) {
            assert!(
                stmt.contains("if not exists")
                    || stmt.contains("if exists")
                    || stmt.starts_with("alter table")
                    || stmt.starts_with("create policy"),
                "{}",
                stmt
            );
        }
    }
}
