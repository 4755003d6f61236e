//! Planned migrations rendered as SQL, one scenario per dialect.

use ddlkit::{Capabilities, Column, Database, Dialect, ForeignKey, Index, Platform, SqlType, Table};

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

fn email_required() -> Database {
    let mut db = blog();
    db.tables[0].columns[1].required = true;
    db
}

fn script(dialect: Dialect, current: &Database, desired: &Database) -> String {
    let platform = Platform::new(dialect);
    let migration = platform.migration(current, desired).unwrap();
    platform.render(&migration).unwrap().join("\n")
}

#[test]
fn generic_recreate_parks_the_old_table() {
    let sql = script(Dialect::Generic, &blog(), &email_required());
    insta::assert_snapshot!(sql, @r#"
    ALTER TABLE "post" DROP CONSTRAINT "fk_post_author_id";
    DROP INDEX "idx_user_email";
    ALTER TABLE "user" RENAME TO "user__old";
    CREATE TABLE "user" (
        "id" INTEGER PRIMARY KEY,
        "email" VARCHAR(100) NOT NULL
    );
    INSERT INTO "user" ("id", "email") SELECT "id", "email" FROM "user__old";
    DROP TABLE "user__old";
    CREATE INDEX "idx_user_email" ON "user" ("email");
    ALTER TABLE "post" ADD CONSTRAINT "fk_post_author_id" FOREIGN KEY ("author_id") REFERENCES "user" ("id");
    "#);
}

#[test]
fn sqlite_recreate_swaps_in_a_staging_table() {
    let sql = script(Dialect::Sqlite, &blog(), &email_required());
    // The key on post survives untouched: it only names the table
    insta::assert_snapshot!(sql, @r#"
    PRAGMA foreign_keys = OFF;
    CREATE TABLE "user__new" (
        "id" INTEGER PRIMARY KEY,
        "email" TEXT NOT NULL
    );
    INSERT INTO "user__new" ("id", "email") SELECT "id", "email" FROM "user";
    DROP TABLE "user";
    ALTER TABLE "user__new" RENAME TO "user";
    CREATE INDEX "idx_user_email" ON "user" ("email");
    PRAGMA foreign_key_check;
    PRAGMA foreign_keys = ON;
    "#);
}

#[test]
fn postgres_recreate_for_column_order() {
    let mut desired = blog();
    desired.tables[0].columns.reverse();

    let sql = script(Dialect::PostgreSql, &blog(), &desired);
    insta::assert_snapshot!(sql, @r#"
    ALTER TABLE "post" DROP CONSTRAINT "fk_post_author_id";
    DROP INDEX "idx_user_email";
    ALTER TABLE "user" RENAME TO "user__old";
    ALTER TABLE "user__old" DROP CONSTRAINT "user_pkey";
    CREATE TABLE "user" (
        "email" VARCHAR(100),
        "id" INTEGER PRIMARY KEY
    );
    INSERT INTO "user" ("email", "id") SELECT "email", "id" FROM "user__old";
    DROP TABLE "user__old";
    CREATE INDEX "idx_user_email" ON "user" ("email");
    ALTER TABLE "post" ADD CONSTRAINT "fk_post_author_id" FOREIGN KEY ("author_id") REFERENCES "user" ("id");
    "#);
}

#[test]
fn mysql_alters_in_place() {
    let mut desired = blog();
    {
        let user = &mut desired.tables[0];
        user.columns[1].size = Some(200);
        user.columns[1].required = true;
        user.columns
            .insert(1, Column::new("name", SqlType::VarChar).with_size(50));
    }

    let platform = Platform::new(Dialect::MySql);
    let migration = platform.migration(&blog(), &desired).unwrap();
    assert!(migration.recreated_tables().is_empty());
    insta::assert_snapshot!(platform.render(&migration).unwrap().join("\n"), @r"
    ALTER TABLE `user` MODIFY COLUMN `email` VARCHAR(200);
    ALTER TABLE `user` MODIFY COLUMN `email` VARCHAR(200) NOT NULL;
    ALTER TABLE `user` ADD COLUMN `name` VARCHAR(50) AFTER `id`;
    ");
}

#[test]
fn new_tables_come_with_their_keys() {
    let current = Database::new("blog");

    let postgres = script(Dialect::PostgreSql, &current, &blog());
    insta::assert_snapshot!(postgres, @r#"
    CREATE TABLE "user" (
        "id" INTEGER PRIMARY KEY,
        "email" VARCHAR(100)
    );
    CREATE INDEX "idx_user_email" ON "user" ("email");
    CREATE TABLE "post" (
        "id" INTEGER PRIMARY KEY,
        "author_id" INTEGER NOT NULL
    );
    ALTER TABLE "post" ADD CONSTRAINT "fk_post_author_id" FOREIGN KEY ("author_id") REFERENCES "user" ("id");
    "#);

    let sqlite = script(Dialect::Sqlite, &current, &blog());
    insta::assert_snapshot!(sqlite, @r#"
    CREATE TABLE "user" (
        "id" INTEGER PRIMARY KEY,
        "email" TEXT
    );
    CREATE INDEX "idx_user_email" ON "user" ("email");
    CREATE TABLE "post" (
        "id" INTEGER PRIMARY KEY,
        "author_id" INTEGER NOT NULL,
        CONSTRAINT "fk_post_author_id" FOREIGN KEY ("author_id") REFERENCES "user" ("id")
    );
    "#);
}

fn pair(key: &str) -> Table {
    let column = |name: &str| {
        let column = Column::new(name, SqlType::Integer);
        if name == key { column.primary_key() } else { column }
    };
    Table::new("t").with_column(column("a")).with_column(column("b"))
}

#[test]
fn postgres_relaxes_nullability_after_moving_the_key() {
    let mut current = Database::new("db").with_table(pair("a"));
    current.tables[0].columns[1].required = true;
    let desired = Database::new("db").with_table(pair("b"));

    let sql = script(Dialect::PostgreSql, &current, &desired);
    insta::assert_snapshot!(sql, @r#"
    ALTER TABLE "t" DROP CONSTRAINT "t_pkey";
    ALTER TABLE "t" ADD PRIMARY KEY ("b");
    ALTER TABLE "t" ALTER COLUMN "a" DROP NOT NULL;
    "#);
}

#[test]
fn postgres_relaxes_nullability_after_dropping_the_key() {
    let current = Database::new("db").with_table(pair("a"));
    let mut desired = current.clone();
    desired.tables[0].clear_primary_key();

    let sql = script(Dialect::PostgreSql, &current, &desired);
    insta::assert_snapshot!(sql, @r#"
    ALTER TABLE "t" DROP CONSTRAINT "t_pkey";
    ALTER TABLE "t" ALTER COLUMN "a" DROP NOT NULL;
    "#);
}

#[test]
fn new_key_column_is_added_not_null() {
    let current = Database::new("db").with_table(
        Table::new("t").with_column(Column::new("a", SqlType::Integer)),
    );
    let mut desired = current.clone();
    desired.tables[0]
        .columns
        .push(Column::new("k", SqlType::VarChar).with_size(10).primary_key());

    let platform = Platform {
        capabilities: Capabilities {
            add_required_column_without_default: true,
            ..Dialect::PostgreSql.capabilities()
        },
        ..Platform::new(Dialect::PostgreSql)
    };
    let migration = platform.migration(&current, &desired).unwrap();
    insta::assert_snapshot!(platform.render(&migration).unwrap().join("\n"), @r#"
    ALTER TABLE "t" ADD COLUMN "k" VARCHAR(10) NOT NULL;
    ALTER TABLE "t" ADD PRIMARY KEY ("k");
    "#);
}
