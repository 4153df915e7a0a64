//! `sqlx::migrate!` embeds the migrations directory at compile time, so a
//! new or edited migration has to force a rebuild of this crate.

fn main() {
    println!("cargo:rerun-if-changed=migrations");
}
