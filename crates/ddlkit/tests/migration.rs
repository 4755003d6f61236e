use ddlkit::{
    Capabilities, Change, Column, Config, Database, Dialect, Error, ForeignKey, Index, Platform,
    SqlType, Table, compare, plan,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn roundtrip(extra: Vec<Column>) -> Table {
    extra.into_iter().fold(
        Table::new("roundtrip")
            .with_column(Column::new("PK", SqlType::Integer).primary_key())
            .with_column(Column::new("VALUE", SqlType::VarChar).with_size(32)),
        |t, c| t.with_column(c),
    )
}

fn blog() -> Database {
    Database::new("blog")
        .with_table(
            Table::new("user")
                .with_column(Column::new("id", SqlType::Integer).primary_key())
                .with_column(Column::new("email", SqlType::VarChar).with_size(100))
                .with_index(Index::non_unique("idx_user_email", ["email"])),
        )
        .with_table(
            Table::new("post")
                .with_column(Column::new("id", SqlType::Integer).primary_key())
                .with_column(Column::new("author_id", SqlType::Integer).required())
                .with_foreign_key(ForeignKey::new("user").reference("author_id", "id")),
        )
}

fn apply_all(db: &Database, changes: &[Change]) -> Database {
    let mut applied = db.clone();
    for change in changes {
        change.apply(&mut applied, false).unwrap();
    }
    applied
}

#[test]
fn test_add_column_at_end_and_index() {
    init_tracing();
    let current = Database::new("test").with_table(roundtrip(vec![]));
    let desired = Database::new("test").with_table(
        roundtrip(vec![Column::new("VALUE2", SqlType::Integer)])
            .with_index(Index::non_unique("idx_on_VALUE", ["VALUE"])),
    );

    let changes = compare(&current, &desired, false).unwrap();
    assert_eq!(changes.len(), 2);
    match &changes[0] {
        Change::AddColumn { table, column, .. } => {
            assert_eq!(table, "roundtrip");
            assert_eq!(column.name, "VALUE2");
        }
        other => panic!("expected an added column, got {}", other),
    }
    assert!(changes[0].at_end());
    match &changes[1] {
        Change::AddIndex { table, index } => {
            assert_eq!(table, "roundtrip");
            assert_eq!(index.name, "idx_on_VALUE");
        }
        other => panic!("expected an added index, got {}", other),
    }

    assert!(apply_all(&current, &changes).is_equivalent_to(&desired, false));
}

#[test]
fn test_remove_primary_key_only() {
    init_tracing();
    let current = Database::new("test").with_table(roundtrip(vec![]));
    let mut desired = current.clone();
    desired.tables[0].clear_primary_key();
    desired.tables[0].columns[0].required = true;

    let changes = compare(&current, &desired, false).unwrap();
    assert_eq!(
        changes,
        vec![Change::RemovePrimaryKey {
            table: "roundtrip".to_string(),
            columns: vec!["PK".to_string()],
        }]
    );

    let applied = apply_all(&current, &changes);
    let pk = applied.tables[0].find_column("PK", false).unwrap();
    assert!(!pk.primary_key);
    assert_eq!(applied.tables[0].columns.len(), 2);
}

#[test]
fn test_rejected_changes_recreate_exactly_once() {
    init_tracing();
    let current = blog();
    let mut desired = blog();
    {
        let user = desired.find_table_mut("user", false).unwrap();
        user.columns[1].required = true;
        user.columns[1].size = Some(200);
        user.columns.push(Column::new("name", SqlType::VarChar).with_size(50));
        user.indices.clear();
        user.indices.push(Index::unique("uq_user_email", ["email"]));
    }

    let changes = compare(&current, &desired, false).unwrap();
    let user_changes: Vec<&Change> = changes
        .iter()
        .filter(|c| c.is_table_scoped() && c.table_name() == "user")
        .collect();
    assert_eq!(user_changes.len(), 5);

    let only_recreate = |_: &Table, change: &Change| matches!(change, Change::RecreateTable { .. });
    let planned = plan(&current, &desired, &changes, &only_recreate, false).unwrap();

    let recreations: Vec<&Change> = planned
        .iter()
        .filter(|c| matches!(c, Change::RecreateTable { .. }))
        .collect();
    assert_eq!(recreations.len(), 1);
    let Change::RecreateTable {
        table,
        target,
        original_changes,
        migrate_data,
    } = recreations[0]
    else {
        unreachable!()
    };
    assert_eq!(table, "user");
    assert!(target.is_equivalent_to(desired.find_table("user", false).unwrap(), false));
    assert_eq!(original_changes.len(), 5);
    assert!(*migrate_data);

    // Nothing of the table's own changes survives next to the recreation
    assert!(
        !planned
            .iter()
            .any(|c| c.is_table_scoped() && !matches!(c, Change::RecreateTable { .. }))
    );
    assert!(apply_all(&current, &planned).is_equivalent_to(&desired, false));
}

#[test]
fn test_rejecting_everything_is_unrepresentable() {
    init_tracing();
    let current = blog();
    let mut desired = blog();
    desired.tables[0].columns[1].required = true;

    let changes = compare(&current, &desired, false).unwrap();
    let reject_all = |_: &Table, _: &Change| false;
    let err = plan(&current, &desired, &changes, &reject_all, false).unwrap_err();
    assert!(matches!(err, Error::Unrepresentable { .. }));
}

#[test]
fn test_planning_leaves_inputs_untouched() {
    let current = blog();
    let mut desired = blog();
    desired.tables[0].columns.insert(1, Column::new("name", SqlType::VarChar));
    let (current_before, desired_before) = (current.clone(), desired.clone());

    let changes = compare(&current, &desired, false).unwrap();
    plan(&current, &desired, &changes, &Capabilities::default(), false).unwrap();
    assert_eq!(current, current_before);
    assert_eq!(desired, desired_before);
}

#[test]
fn test_composite_key_extension() {
    init_tracing();
    let current = Database::new("test").with_table(roundtrip(vec![]));
    let mut desired = current.clone();
    desired.tables[0]
        .set_primary_key(&["PK".to_string(), "VALUE".to_string()], false)
        .unwrap();

    let changes = compare(&current, &desired, false).unwrap();
    assert!(matches!(
        changes.as_slice(),
        [Change::ChangePrimaryKey { new_columns, .. }] if new_columns.len() == 2
    ));

    let planned = plan(
        &current,
        &desired,
        &changes,
        &Dialect::Generic.capabilities(),
        false,
    )
    .unwrap();
    let position = |f: fn(&Change) -> bool| planned.iter().position(f).unwrap();
    let removed = position(|c| matches!(c, Change::RemovePrimaryKey { .. }));
    let added = position(|c| {
        matches!(c, Change::AddPrimaryKey { columns, .. } if columns.len() == 2)
    });
    assert!(removed < added);
    assert!(apply_all(&current, &planned).is_equivalent_to(&desired, false));
}

#[test]
fn test_ordering_of_tables_and_foreign_keys() {
    init_tracing();
    let current = Database::new("blog");
    let desired = blog().with_table(
        Table::new("comment")
            .with_column(Column::new("id", SqlType::Integer).primary_key())
            .with_column(Column::new("post_id", SqlType::Integer))
            .with_foreign_key(ForeignKey::new("post").reference("post_id", "id")),
    );
    let mut reversed = desired.clone();
    reversed.tables.reverse();

    for desired in [&desired, &reversed] {
        let changes = compare(&current, desired, false).unwrap();
        let position = |pred: &dyn Fn(&Change) -> bool| changes.iter().position(pred).unwrap();
        let add_table = |name: &'static str| {
            move |c: &Change| matches!(c, Change::AddTable { table } if table.name == name)
        };

        assert!(position(&add_table("user")) < position(&add_table("post")));
        assert!(position(&add_table("post")) < position(&add_table("comment")));
        let first_fk = position(&|c: &Change| matches!(c, Change::AddForeignKey { .. }));
        assert!(position(&add_table("comment")) < first_fk);

        // And back again: referencing tables go first
        let removal = compare(desired, &current, false).unwrap();
        let names: Vec<&str> = removal
            .iter()
            .filter(|c| matches!(c, Change::RemoveTable { .. }))
            .map(Change::table_name)
            .collect();
        assert_eq!(names, vec!["comment", "post", "user"]);
    }
}

#[test]
fn test_removed_column_never_outlives_its_index() {
    let current = blog();
    let mut desired = blog();
    let user = desired.find_table_mut("user", false).unwrap();
    user.indices.clear();
    user.remove_column("email", false).unwrap();

    let changes = compare(&current, &desired, false).unwrap();
    let summary: Vec<String> = changes.iter().map(|c| c.to_string()).collect();
    assert_eq!(
        summary,
        vec!["- user INDEX idx_user_email (email)", "- user.email"]
    );
}

#[test]
fn test_foreign_key_cycles_terminate() {
    init_tracing();
    let a = Table::new("a")
        .with_column(Column::new("id", SqlType::Integer).primary_key())
        .with_column(Column::new("b_id", SqlType::Integer))
        .with_foreign_key(ForeignKey::new("b").reference("b_id", "id"));
    let b = Table::new("b")
        .with_column(Column::new("id", SqlType::Integer).primary_key())
        .with_column(Column::new("a_id", SqlType::Integer))
        .with_foreign_key(ForeignKey::new("a").reference("a_id", "id"));
    let desired = Database::new("cycle").with_table(a).with_table(b);
    let empty = Database::new("cycle");

    let changes = compare(&empty, &desired, false).unwrap();
    assert_eq!(changes.len(), 4);
    assert!(apply_all(&empty, &changes).is_equivalent_to(&desired, false));

    let changes = compare(&desired, &empty, false).unwrap();
    assert!(apply_all(&desired, &changes).tables.is_empty());
}

#[test]
fn test_case_insensitive_names_match() {
    let current = blog();
    let mut desired = blog();
    for table in &mut desired.tables {
        table.name = table.name.to_uppercase();
        for column in &mut table.columns {
            column.name = column.name.to_uppercase();
        }
        for fk in &mut table.foreign_keys {
            fk.foreign_table = fk.foreign_table.to_uppercase();
            for reference in &mut fk.references {
                reference.local = reference.local.to_uppercase();
                reference.foreign = reference.foreign.to_uppercase();
            }
        }
    }
    desired.tables[0].indices[0].columns[0].name = "EMAIL".to_string();

    assert!(compare(&current, &desired, false).unwrap().is_empty());
    assert!(!compare(&current, &desired, true).unwrap().is_empty());
}

#[test]
fn test_platform_from_config() {
    init_tracing();
    let config = Config::from_styx("dialect sqlite\ncapabilities {reorder_columns true}\n").unwrap();
    let platform = Platform::from_config(&config).unwrap();

    let current = blog();
    let mut desired = blog();
    desired.tables[0].columns.reverse();

    let changes = platform.compare(&current, &desired).unwrap();
    assert!(matches!(changes.as_slice(), [Change::ReorderColumns { .. }]));
    let migration = platform.migration(&current, &desired).unwrap();
    assert!(migration.recreated_tables().is_empty());
}
