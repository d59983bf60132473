use sqlx::PgPool;

/// Round-trip a trivial query to prove connectivity.
pub(crate) async fn run_ping(pool: &PgPool) -> anyhow::Result<()> {
    let one: i32 = sqlx::query_scalar("SELECT 1").fetch_one(pool).await?;
    anyhow::ensure!(one == 1, "unexpected ping result {one}");
    println!("database ok");
    Ok(())
}

/// Apply pending migrations and report how many ran.
pub(crate) async fn run_migrate(pool: &PgPool) -> anyhow::Result<()> {
    let applied = smpdb_db::run_migrations(pool).await?;
    if applied == 0 {
        println!("migrations up to date");
    } else {
        println!("applied {applied} migrations");
    }
    Ok(())
}
