use ban_warden::ban::{BanEvent, BanService, BanStore, ChannelSink, MigrationEngine};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

#[tokio::main]
async fn main() {
    println!("Ban Lifecycle Walkthrough");
    println!("-------------------------");

    // Open a throwaway store
    let data_dir = std::env::temp_dir().join(format!("ban-warden-demo-{}", Uuid::new_v4()));
    let store = Arc::new(BanStore::open(&data_dir).await.expect("open store"));

    // Nothing legacy to migrate, but run the engine the way startup would
    let migrated = MigrationEngine::new(Arc::clone(&store))
        .run()
        .await
        .expect("migration");
    println!("\nLegacy records migrated: {migrated}");

    // Events land on this channel; print them as a collaborator would
    let (tx, mut rx) = mpsc::channel::<BanEvent>(16);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                BanEvent::Created { ban, notify } => {
                    println!(
                        "  [event] ban created: {} by {} (notify: {notify})",
                        ban.subject(),
                        ban.issuer()
                    );
                }
                BanEvent::Pardoned { ban, notify } => {
                    println!("  [event] ban pardoned: {} (notify: {notify})", ban.subject());
                }
            }
        }
    });

    let service = BanService::new(Arc::clone(&store), Arc::new(ChannelSink::new(tx)));
    service.reload_cache();

    // 1. Permanent ban
    println!("\n--- Banning Steve permanently ---");
    let created = service
        .ban_player("Steve", "Admin", "griefing spawn", 0, true)
        .await
        .expect("ban");
    println!("Ban created: {created}");
    println!("Is Steve banned? {}", service.is_player_banned("steve"));

    // 2. Duplicate ban is a no-op
    println!("\n--- Banning STEVE again (case variant) ---");
    let created = service
        .ban_player("STEVE", "Admin", "still griefing", 0, true)
        .await
        .expect("ban");
    println!("Ban created: {created} (already banned)");

    // 3. Annotate the active ban
    println!("\n--- Adding a comment ---");
    service
        .add_ban_comment("Steve", "Moderator", "second report this week")
        .await
        .expect("comment");
    let ban = service.get_player_ban("Steve").expect("active ban");
    println!("Reason: {}", ban.reason());
    println!("Comments: {:?}", ban.comments());

    // 4. Pardon, then ban again
    println!("\n--- Pardoning Steve ---");
    let pardoned = service.pardon_player("Steve", "Admin", false).await.expect("pardon");
    println!("Pardoned: {pardoned}");
    println!("Is Steve banned? {}", service.is_player_banned("Steve"));

    println!("\n--- Banning Steve again, 1 hour this time ---");
    service
        .ban_player("Steve", "Admin", "back at it", 3_600_000, true)
        .await
        .expect("ban");

    // 5. Full history survives every transition
    println!("\n--- Ban history for Steve ---");
    for ban in service.get_player_bans("steve") {
        println!(
            "  {} | state: {} | reason: {} | expires: {}",
            ban.created_at(),
            ban.state(),
            ban.reason(),
            ban.expires_at()
                .map_or_else(|| "never".to_string(), |at| at.to_string())
        );
    }

    drop(service);
    printer.await.ok();
    tokio::fs::remove_dir_all(&data_dir).await.ok();
    println!("\nBan lifecycle walkthrough completed successfully!");
}
