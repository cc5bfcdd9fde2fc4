// Histories must survive process restarts and be visible to every connection
// opened on the same database file.

use memoria_core::Message;
use memoria_store::ConversationStore;
use rusqlite::Connection;

#[test]
fn history_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memoria.db");

    {
        let store = ConversationStore::new(Connection::open(&path).unwrap()).unwrap();
        store
            .replace("patient-7", &[Message::system("sys"), Message::user("fever")])
            .unwrap();
    }

    let store = ConversationStore::new(Connection::open(&path).unwrap()).unwrap();
    let messages = store.get("patient-7").unwrap();
    assert_eq!(messages, vec![Message::system("sys"), Message::user("fever")]);
    assert_eq!(store.get_record("patient-7").unwrap().unwrap().version, 1);
}

#[test]
fn two_connections_share_versions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memoria.db");

    let live = ConversationStore::new(Connection::open(&path).unwrap()).unwrap();
    let batch = ConversationStore::new(Connection::open(&path).unwrap()).unwrap();

    let seen = live.replace("c", &[Message::user("1")]).unwrap();
    live.replace("c", &[Message::user("1"), Message::user("2")])
        .unwrap();

    // The batch writer read `seen`, but the live path wrote since.
    assert!(!batch
        .replace_if_version("c", &[Message::assistant("summary")], &seen)
        .unwrap());
    assert_eq!(batch.get("c").unwrap().len(), 2);
}
