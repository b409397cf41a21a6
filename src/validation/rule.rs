//! Structured validation rules.
//!
//! Rules arrive as strings in the usual pipe/comma syntax
//! (`"required|min:3|unique:users,email"`) and are parsed once into [`Rule`]s so they
//! can be rewritten without string surgery. `Display` writes the same syntax back.

use super::error::ValidationError;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A single rule: name plus comma-separated parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    name: String,
    params: Vec<String>,
}

impl Rule {
    pub fn new<I, S>(name: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn param(&self, idx: usize) -> Option<&str> {
        self.params.get(idx).map(String::as_str)
    }

    /// Point a `unique` rule at `field` and exclude the row whose key is `identity`.
    ///
    /// Parameter 1 (the column) defaults to `field` when absent; parameter 2 becomes
    /// `identity`. Parameter 3 defaults to `key_column` unless that is `id`. A rule
    /// without a table parameter is left as is.
    pub fn exclude_identity(&mut self, field: &str, identity: &str, key_column: &str) {
        if self.params.is_empty() {
            return;
        }
        if self.params.len() < 2 {
            self.params.push(field.to_string());
        }
        if self.params.len() < 3 {
            self.params.push(identity.to_string());
        } else {
            self.params[2] = identity.to_string();
        }
        if self.params.len() < 4 && key_column != "id" {
            self.params.push(key_column.to_string());
        }
    }
}

impl FromStr for Rule {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        let (name, params) = match token.split_once(':') {
            Some((name, params)) => (name.trim(), Some(params)),
            None => (token, None),
        };
        if name.is_empty() {
            return Err(ValidationError::InvalidRule(s.to_string()));
        }
        let params = match params {
            None => Vec::new(),
            // Patterns may contain commas
            Some(pattern) if name == "regex" => vec![pattern.to_string()],
            Some(params) => params.split(',').map(|p| p.trim().to_string()).collect(),
        };
        Ok(Self {
            name: name.to_string(),
            params,
        })
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.params.is_empty() {
            write!(f, ":{}", self.params.join(","))?;
        }
        Ok(())
    }
}

/// Ordered rules for one field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldRules(Vec<Rule>);

impl FieldRules {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self(rules)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Rule> {
        self.0.iter_mut()
    }

    pub fn has(&self, name: &str) -> bool {
        self.0.iter().any(|r| r.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.0.iter().find(|r| r.name == name)
    }

    pub fn push(&mut self, rule: Rule) {
        self.0.push(rule);
    }
}

impl FromStr for FieldRules {
    type Err = ValidationError;

    /// Empty tokens (`"required||min:3"`) are skipped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split('|')
            .filter(|token| !token.trim().is_empty())
            .map(str::parse::<Rule>)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl fmt::Display for FieldRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rule) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            write!(f, "{rule}")?;
        }
        Ok(())
    }
}

impl FromIterator<Rule> for FieldRules {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'r> IntoIterator for &'r FieldRules {
    type Item = &'r Rule;
    type IntoIter = std::slice::Iter<'r, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Field name to rules; setting a field again replaces its rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet(BTreeMap<String, FieldRules>);

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `(field, "rule|rule:param")` pairs.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidRule` for the first malformed rule.
    pub fn parse<I, K, V>(pairs: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut set = Self::new();
        for (field, rules) in pairs {
            set.set(field, rules.as_ref().parse()?);
        }
        Ok(set)
    }

    pub fn set(&mut self, field: impl Into<String>, rules: FieldRules) -> Option<FieldRules> {
        self.0.insert(field.into(), rules)
    }

    pub fn get(&self, field: &str) -> Option<&FieldRules> {
        self.0.get(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldRules> {
        self.0.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldRules)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy of this set prepared for validating a specific record.
    ///
    /// Fields with no rules are dropped. With an `identity`, every rule whose name
    /// starts with `unique` is rewritten by [`Rule::exclude_identity`] to skip the row
    /// whose `key_column` holds it.
    pub fn normalized(&self, identity: Option<&str>, key_column: &str) -> RuleSet {
        self.0
            .iter()
            .filter(|(_, rules)| !rules.is_empty())
            .map(|(field, rules)| {
                let mut rules = rules.clone();
                if let Some(id) = identity {
                    for rule in rules.iter_mut().filter(|r| r.name.starts_with("unique")) {
                        rule.exclude_identity(field, id, key_column);
                    }
                }
                (field.clone(), rules)
            })
            .collect()
    }
}

impl FromIterator<(String, FieldRules)> for RuleSet {
    fn from_iter<I: IntoIterator<Item = (String, FieldRules)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let rules: FieldRules = "required|between:3,20|regex:/^[a-z,]+$/".parse().unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules.get("between").unwrap().params(), ["3", "20"]);
        assert_eq!(rules.get("regex").unwrap().params(), ["/^[a-z,]+$/"]);
        assert_eq!(rules.to_string(), "required|between:3,20|regex:/^[a-z,]+$/");
    }

    #[test]
    fn test_empty_rule_name_is_invalid() {
        assert!(matches!(":users".parse::<Rule>(), Err(ValidationError::InvalidRule(_))));
        assert!("".parse::<FieldRules>().unwrap().is_empty());
    }

    #[test]
    fn test_normalized_rewrites_unique_for_existing_record() {
        let set = RuleSet::parse([
            ("email", "required|unique:users"),
            ("login", "unique:accounts,username,0,account_id"),
            ("nickname", ""),
        ])
        .unwrap();

        let existing = set.normalized(Some("42"), "id");
        assert_eq!(existing.get("email").unwrap().to_string(), "required|unique:users,email,42");
        assert_eq!(
            existing.get("login").unwrap().to_string(),
            "unique:accounts,username,42,account_id"
        );
        assert!(!existing.contains("nickname"));

        let fresh = set.normalized(None, "id");
        assert_eq!(fresh.get("email").unwrap().to_string(), "required|unique:users");
        assert!(!fresh.contains("nickname"));

        // the stored set is untouched
        assert_eq!(set.get("email").unwrap().to_string(), "required|unique:users");
    }

    #[test]
    fn test_normalized_names_custom_key_column() {
        let set = RuleSet::parse([
            ("name", "unique:items"),
            ("sku", "unique:items,sku,0,item_code"),
        ])
        .unwrap();

        let existing = set.normalized(Some("ABC"), "code");
        assert_eq!(existing.get("name").unwrap().to_string(), "unique:items,name,ABC,code");
        assert_eq!(existing.get("sku").unwrap().to_string(), "unique:items,sku,ABC,item_code");
    }
}
