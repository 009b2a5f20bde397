//! Command processor: pure dispatch over the directory, run under the caller's lock.

use crate::directory::{Directory, FileEntry, PeerId};
use crate::protocol::{Command, Reply};

/// Result of processing one command. `mutated` tells the caller whether the
/// directory changed and must be flushed before the reply is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processed {
    pub reply: Reply,
    pub mutated: bool,
}

impl Processed {
    fn reply(reply: Reply) -> Self {
        Self {
            reply,
            mutated: false,
        }
    }

    fn mutated(reply: Reply) -> Self {
        Self {
            reply,
            mutated: true,
        }
    }
}

/// Apply one command from `peer` to the directory and produce the reply.
/// Mutating commands from a peer that never joined are answered with
/// CLIENTNOTFOUND rather than implicitly registering it.
pub fn process(cmd: &Command, peer: PeerId, dir: &mut Directory) -> Processed {
    match cmd {
        Command::Join => {
            if dir.join(peer) {
                Processed::mutated(Reply::ConfirmJoin)
            } else {
                Processed::reply(Reply::ClientAlreadyConnected)
            }
        }
        Command::CreateFile { filename, size } => {
            if !dir.contains_peer(peer) {
                return Processed::reply(Reply::ClientNotFound);
            }
            let entry = FileEntry {
                filename: filename.clone(),
                size: *size,
            };
            if dir.publish(peer, entry) {
                Processed::mutated(Reply::ConfirmCreateFile)
            } else {
                Processed::reply(Reply::FileAlreadyExists)
            }
        }
        Command::DeleteFile { filename } => {
            if dir.withdraw(peer, filename) {
                Processed::mutated(Reply::ConfirmDeleteFile)
            } else {
                Processed::reply(Reply::FileNotFound)
            }
        }
        Command::Search { filename } => {
            let hits = dir.search(filename);
            if hits.is_empty() {
                Processed::reply(Reply::FileNotFound)
            } else {
                Processed::reply(Reply::Records(hits))
            }
        }
        Command::ListFiles => {
            let all = dir.all_files();
            if all.is_empty() {
                Processed::reply(Reply::NoFiles)
            } else {
                Processed::reply(Reply::Records(all))
            }
        }
        Command::Leave => {
            if dir.leave(peer) {
                Processed::mutated(Reply::ConfirmLeave)
            } else {
                Processed::reply(Reply::ClientNotFound)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FileRecord;

    fn peer(s: &str) -> PeerId {
        PeerId(s.parse().unwrap())
    }

    fn create(name: &str, size: u64) -> Command {
        Command::CreateFile {
            filename: name.to_owned(),
            size,
        }
    }

    #[test]
    fn join_leave_lifecycle() {
        let mut dir = Directory::new();
        let p = peer("10.0.0.1");

        let joined = process(&Command::Join, p, &mut dir);
        assert_eq!(joined.reply, Reply::ConfirmJoin);
        assert!(joined.mutated);

        let again = process(&Command::Join, p, &mut dir);
        assert_eq!(again.reply, Reply::ClientAlreadyConnected);
        assert!(!again.mutated);

        let left = process(&Command::Leave, p, &mut dir);
        assert_eq!(left.reply, Reply::ConfirmLeave);
        assert!(left.mutated);
        assert!(!dir.contains_peer(p));

        let gone = process(&Command::Leave, p, &mut dir);
        assert_eq!(gone.reply, Reply::ClientNotFound);
    }

    #[test]
    fn create_then_search_finds_record() {
        let mut dir = Directory::new();
        let p = peer("10.0.0.1");
        process(&Command::Join, p, &mut dir);

        let created = process(&create("report.pdf", 2048), p, &mut dir);
        assert_eq!(created.reply, Reply::ConfirmCreateFile);
        assert!(created.mutated);

        let found = process(
            &Command::Search {
                filename: "report.pdf".to_owned(),
            },
            peer("10.0.0.9"),
            &mut dir,
        );
        assert_eq!(
            found.reply,
            Reply::Records(vec![FileRecord {
                filename: "report.pdf".to_owned(),
                peer: "10.0.0.1".parse().unwrap(),
                size: 2048,
            }])
        );
    }

    #[test]
    fn duplicate_create_does_not_duplicate_entry() {
        let mut dir = Directory::new();
        let p = peer("10.0.0.1");
        process(&Command::Join, p, &mut dir);
        process(&create("report.pdf", 2048), p, &mut dir);

        let dup = process(&create("report.pdf", 2048), p, &mut dir);
        assert_eq!(dup.reply, Reply::FileAlreadyExists);
        assert!(!dup.mutated);
        assert_eq!(dir.files_of(p).unwrap().len(), 1);
    }

    #[test]
    fn delete_is_idempotent_safe() {
        let mut dir = Directory::new();
        let p = peer("10.0.0.1");
        process(&Command::Join, p, &mut dir);
        process(&create("a.txt", 1), p, &mut dir);

        let del = Command::DeleteFile {
            filename: "a.txt".to_owned(),
        };
        assert_eq!(process(&del, p, &mut dir).reply, Reply::ConfirmDeleteFile);
        let again = process(&del, p, &mut dir);
        assert_eq!(again.reply, Reply::FileNotFound);
        assert!(!again.mutated);
    }

    #[test]
    fn create_without_join_is_client_not_found() {
        let mut dir = Directory::new();
        let out = process(&create("a.txt", 1), peer("10.0.0.1"), &mut dir);
        assert_eq!(out.reply, Reply::ClientNotFound);
        assert!(!out.mutated);
        assert!(!dir.contains_peer(peer("10.0.0.1")));
    }

    #[test]
    fn search_miss_and_empty_list() {
        let mut dir = Directory::new();
        let p = peer("10.0.0.1");

        let miss = process(
            &Command::Search {
                filename: "nope".to_owned(),
            },
            p,
            &mut dir,
        );
        assert_eq!(miss.reply, Reply::FileNotFound);

        let empty = process(&Command::ListFiles, p, &mut dir);
        assert_eq!(empty.reply, Reply::NoFiles);

        // A joined peer with nothing published still lists as NOFILES.
        process(&Command::Join, p, &mut dir);
        let still_empty = process(&Command::ListFiles, p, &mut dir);
        assert_eq!(still_empty.reply, Reply::NoFiles);
    }

    #[test]
    fn leave_withdraws_all_entries() {
        let mut dir = Directory::new();
        let p = peer("10.0.0.1");
        process(&Command::Join, p, &mut dir);
        process(&create("a.txt", 1), p, &mut dir);
        process(&create("b.txt", 2), p, &mut dir);

        process(&Command::Leave, p, &mut dir);
        let listed = process(&Command::ListFiles, p, &mut dir);
        assert_eq!(listed.reply, Reply::NoFiles);
    }
}
