//! Validate-before-save behaviour against `MockDatabase`.

mod common;

use common::statements;
use lifeguard_related::mock::MockDatabase;
use lifeguard_related::validation::{Attributes, FieldRules, Rule};
use lifeguard_related::{
    CustomMessages, MessageBag, Record, RuleSet, StatementExecutor, ValidatingModel, ValidationError, Validator,
};
use sea_query::Value;
use serde_json::json;
use std::cell::Cell;

#[derive(Debug, Clone, Default)]
struct Account {
    id: Option<i64>,
    email: String,
    password: String,
    password_confirmation: String,
}

impl Record for Account {
    fn table_name(&self) -> &str {
        "accounts"
    }

    fn identity(&self) -> Option<Value> {
        self.id.map(Value::from)
    }

    fn set_identity(&mut self, id: Value) {
        match id {
            Value::BigInt(id) => self.id = id,
            Value::Int(id) => self.id = id.map(i64::from),
            _ => {}
        }
    }

    fn attributes(&self) -> Vec<(String, Value)> {
        vec![
            ("email".into(), self.email.clone().into()),
            ("password".into(), self.password.clone().into()),
        ]
    }

    fn validation_data(&self) -> Attributes {
        let mut data = Attributes::new();
        data.insert("email".into(), json!(self.email));
        data.insert("password".into(), json!(self.password));
        data.insert("password_confirmation".into(), json!(self.password_confirmation));
        data
    }
}

fn account(id: Option<i64>, email: &str) -> Account {
    Account {
        id,
        email: email.into(),
        password: "hunter22".into(),
        password_confirmation: "hunter22".into(),
    }
}

/// Counts calls and reports a fixed outcome
struct Stub {
    calls: Cell<usize>,
    fail: bool,
}

impl Validator for &Stub {
    fn validate(
        &self,
        _data: &Attributes,
        _rules: &RuleSet,
        _messages: &CustomMessages,
        _db: &dyn StatementExecutor,
    ) -> Result<MessageBag, ValidationError> {
        self.calls.set(self.calls.get() + 1);
        let mut bag = MessageBag::new();
        if self.fail {
            bag.add("email", "nope");
        }
        Ok(bag)
    }
}

#[test]
fn unique_rule_probes_with_identity_excluded() {
    // lookup finds no other row with this email
    let db = MockDatabase::new().append_column_results([vec![]]).append_exec_results([1]);
    let mut model = ValidatingModel::new(account(Some(42), "a@example.com"), &db);
    model.set_rule("email", "required|unique:accounts").unwrap();

    assert_eq!(
        model.normalized_rules().get("email").unwrap().to_string(),
        "required|unique:accounts,email,42"
    );
    assert!(model.save().unwrap());

    let log = db.statements();
    assert_eq!(log.len(), 2);
    assert!(log[0].sql.contains(r#"CAST("accounts"."id" AS TEXT) <> $2"#), "{}", log[0].sql);
    assert_eq!(log[0].values[1], Value::from("42"));
    assert!(log[1].sql.starts_with(r#"UPDATE "accounts" SET"#), "{}", log[1].sql);
}

#[test]
fn new_record_keeps_unique_rule_and_inserts() {
    let db = MockDatabase::new().append_column_results([vec![], vec![Value::BigInt(Some(7))]]);
    let mut model = ValidatingModel::new(account(None, "new@example.com"), &db);
    model.set_rule("email", "required|email|unique:accounts").unwrap();

    assert_eq!(
        model.normalized_rules().get("email").unwrap().to_string(),
        "required|email|unique:accounts"
    );
    assert!(model.save().unwrap());
    assert_eq!(model.record().id, Some(7));

    let sql = statements(&db);
    assert!(!sql[0].contains("<>"), "{}", sql[0]);
    assert_eq!(
        sql[1],
        r#"INSERT INTO "accounts" ("email", "password") VALUES ($1, $2) RETURNING "id""#
    );
}

#[test]
fn serial_key_is_stored_and_next_save_updates() {
    let db = MockDatabase::new().append_column_results([vec![Value::Int(Some(9))]]);
    let mut model = ValidatingModel::new(account(None, "serial@example.com"), &db);

    assert!(model.save().unwrap());
    assert_eq!(model.record().id, Some(9));

    assert!(model.save().unwrap());
    let sql = statements(&db);
    assert_eq!(sql.len(), 2);
    assert!(sql[1].starts_with(r#"UPDATE "accounts" SET"#), "{}", sql[1]);
}

/// Keyed by a natural `code` column instead of `id`
#[derive(Debug, Clone)]
struct Item {
    code: Option<String>,
    name: String,
}

impl Record for Item {
    fn table_name(&self) -> &str {
        "items"
    }

    fn primary_key(&self) -> &str {
        "code"
    }

    fn identity(&self) -> Option<Value> {
        self.code.clone().map(Value::from)
    }

    fn set_identity(&mut self, id: Value) {
        if let Value::String(code) = id {
            self.code = code.map(|c| c.to_string());
        }
    }

    fn attributes(&self) -> Vec<(String, Value)> {
        vec![("name".into(), self.name.clone().into())]
    }
}

#[test]
fn unique_rule_excludes_row_by_custom_key_column() {
    let db = MockDatabase::new().append_column_results([vec![]]);
    let item = Item {
        code: Some("ABC".into()),
        name: "Widget".into(),
    };
    let mut model = ValidatingModel::new(item, &db);
    model.set_rule("name", "required|unique:items").unwrap();

    assert_eq!(
        model.normalized_rules().get("name").unwrap().to_string(),
        "required|unique:items,name,ABC,code"
    );
    assert!(model.save().unwrap());

    let log = db.statements();
    assert!(log[0].sql.contains(r#"CAST("items"."code" AS TEXT) <> $2"#), "{}", log[0].sql);
    assert!(!log[0].sql.contains(r#""items"."id""#), "{}", log[0].sql);
    assert_eq!(log[0].values[1], Value::from("ABC"));
    assert!(log[1].sql.ends_with(r#"WHERE "code" = $2"#), "{}", log[1].sql);
}

#[test]
fn taken_email_blocks_save() {
    let db = MockDatabase::new().append_column_results([vec![Value::from(1)]]);
    let mut model = ValidatingModel::new(account(None, "taken@example.com"), &db);
    model.set_rule("email", "unique:accounts").unwrap();

    assert!(!model.save().unwrap());
    assert_eq!(model.errors().get("email"), ["The email has already been taken."]);
    // only the probe ran
    assert_eq!(db.statements().len(), 1);
}

#[test]
fn invalid_save_skips_persistence_and_force_save_does_not() {
    let db = MockDatabase::new().append_column_results([vec![Value::BigInt(Some(1))]]);
    let stub = Stub {
        calls: Cell::new(0),
        fail: true,
    };
    let mut model = ValidatingModel::with_validator(account(None, "x@example.com"), &db, &stub);

    assert!(!model.save().unwrap());
    assert!(db.statements().is_empty());
    assert_eq!(model.errors().first("email"), Some("nope"));

    assert!(model.force_save().unwrap());
    assert_eq!(stub.calls.get(), 1);
    assert_eq!(db.statements().len(), 1);
}

#[test]
fn confirmation_and_custom_messages() {
    let db = MockDatabase::new();
    let mut record = account(None, "c@example.com");
    record.password_confirmation = "hunter23".into();
    let mut model = ValidatingModel::new(record, &db);
    model
        .set_rule("password", "required|min:8|confirmed")
        .unwrap()
        .set_custom_message("password.confirmed", "Passwords differ.");

    assert!(!model.validate().unwrap());
    assert_eq!(model.errors().get("password"), ["Passwords differ."]);

    model.record_mut().password_confirmation = "hunter22".into();
    assert!(model.validate().unwrap());
    assert!(model.errors().is_empty());
}

#[test]
fn rule_round_trip_and_removal() {
    let db = MockDatabase::new();
    let mut model = ValidatingModel::new(Account::default(), &db);

    model.set_rule("email", "required|email").unwrap();
    assert_eq!(model.rules().get("email").unwrap().to_string(), "required|email");

    model.set_field_rules("email", FieldRules::new(vec![Rule::new("max", ["255"])]));
    assert_eq!(model.rules().get("email").unwrap().to_string(), "max:255");

    model.remove_rule("email");
    assert!(!model.rules().contains("email"));
    assert!(model.rules().is_empty());
}

#[test]
fn empty_rule_lists_are_not_checked() {
    let db = MockDatabase::new();
    let mut model = ValidatingModel::new(Account::default(), &db);
    model.set_rules(RuleSet::parse([("email", ""), ("password", "")]).unwrap());

    assert!(model.normalized_rules().is_empty());
    assert!(model.validate().unwrap());
}

#[test]
fn unknown_rule_surfaces_as_error_and_keeps_old_messages() {
    let db = MockDatabase::new();
    let mut model = ValidatingModel::new(Account::default(), &db);
    model.add_error("email", "from before");
    model.set_rule("email", "required|sparkly").unwrap();

    assert!(matches!(model.validate(), Err(ValidationError::UnknownRule(ref r)) if r == "sparkly"));
    assert_eq!(model.errors().first("email"), Some("from before"));
}
