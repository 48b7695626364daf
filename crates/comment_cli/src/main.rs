//! CLI smoke entry point.
//!
//! # Responsibility
//! - Exercise the full comment stack (store, repository, service) against an
//!   in-memory or file-backed database.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `comment_cli [DB_PATH]`. Set `COMMENT_LOG_DIR` to enable rolling
//! file logs.

use comment_core::{
    core_version, default_log_level, init_logging, CallContext, CommentPage, CommentService,
    InMemoryUserDirectory, NewComment, SqliteCommentStore, StoreCommentRepository, StoreConfig,
    Target,
};
use log::info;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    if let Ok(log_dir) = std::env::var("COMMENT_LOG_DIR") {
        init_logging(default_log_level(), &log_dir)?;
    }

    let store = match std::env::args().nth(1) {
        Some(path) => SqliteCommentStore::open(&path, &StoreConfig::default())?,
        None => SqliteCommentStore::open_in_memory()?,
    };
    let users = InMemoryUserDirectory::new()
        .with_profile(1, "ada", "https://avatars.local/ada.png")
        .with_profile(2, "linus", "https://avatars.local/linus.png");
    let service = CommentService::new(StoreCommentRepository::new(store), users);

    let ctx = CallContext::background();
    let target = Target::new("article", 1);
    let root = service.create(&ctx, &NewComment::top_level(1, target.clone(), "first!"))?;
    let reply = service.create(&ctx, &NewComment::reply(2, target.clone(), root, "agreed"))?;
    service.create(&ctx, &NewComment::reply(1, target.clone(), reply, "thanks"))?;
    info!(
        "event=cli_probe module=cli status=ok root={} reply={}",
        root, reply
    );

    println!("comment_core version={}", core_version());
    print_page("top-level", &service.list(&ctx, &target, 0, 10)?);
    print_page("thread", &service.replies(&ctx, root, 0, 10)?);
    Ok(())
}

fn print_page(label: &str, page: &CommentPage) {
    println!("{label} total={}", page.total);
    for comment in &page.items {
        println!(
            "  #{} by {} ({} previews): {}",
            comment.id,
            comment.author.nickname,
            comment.children.len(),
            comment.content
        );
    }
}
