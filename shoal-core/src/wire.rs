//! Line codec: newline-delimited UTF-8 text, one command per line.
//! Replies are blocks of text with no length prefix; readers use a bounded buffer.

use std::net::IpAddr;

use crate::protocol::{Command, FileRecord, Reply, TransferRequest};

/// Longest accepted request line or reply block, in bytes.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Decode one tracker command line. Whitespace-split; the first token selects
/// the command, the rest are its arguments.
pub fn parse_command(line: &str) -> Result<Command, CommandParseError> {
    let mut tokens = line.split_whitespace();
    let keyword = tokens.next().ok_or(CommandParseError::Unknown)?;
    let args: Vec<&str> = tokens.collect();
    match keyword {
        "JOIN" => match args.as_slice() {
            [] => Ok(Command::Join),
            _ => Err(CommandParseError::BadArgs),
        },
        "LISTFILES" => match args.as_slice() {
            [] => Ok(Command::ListFiles),
            _ => Err(CommandParseError::BadArgs),
        },
        "CREATEFILE" => match args.as_slice() {
            [filename, size] => {
                let size: u64 = size.parse().map_err(|_| CommandParseError::BadArgs)?;
                Ok(Command::CreateFile {
                    filename: (*filename).to_owned(),
                    size,
                })
            }
            _ => Err(CommandParseError::BadArgs),
        },
        "DELETEFILE" => match args.as_slice() {
            [filename] => Ok(Command::DeleteFile {
                filename: (*filename).to_owned(),
            }),
            _ => Err(CommandParseError::BadArgs),
        },
        "SEARCH" => match args.as_slice() {
            [filename] => Ok(Command::Search {
                filename: (*filename).to_owned(),
            }),
            _ => Err(CommandParseError::BadArgs),
        },
        "LEAVE" => match args.as_slice() {
            [] => Ok(Command::Leave),
            _ => Err(CommandParseError::BadArgs),
        },
        _ => Err(CommandParseError::Unknown),
    }
}

/// Error decoding a command line. `Unknown` maps to the UNKNOWNCOMMAND reply,
/// `BadArgs` to INVALIDCOMMAND.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unknown command")]
    Unknown,
    #[error("wrong argument count or malformed argument")]
    BadArgs,
}

/// Encode a command as its request line, without the trailing newline.
pub fn format_command(cmd: &Command) -> String {
    match cmd {
        Command::Join => "JOIN".to_owned(),
        Command::ListFiles => "LISTFILES".to_owned(),
        Command::CreateFile { filename, size } => format!("CREATEFILE {filename} {size}"),
        Command::DeleteFile { filename } => format!("DELETEFILE {filename}"),
        Command::Search { filename } => format!("SEARCH {filename}"),
        Command::Leave => "LEAVE".to_owned(),
    }
}

/// Encode a reply as its wire text, without the trailing newline.
/// `Records` becomes one `FILE <filename> <peer> <size>` line per record.
pub fn format_reply(reply: &Reply) -> String {
    match reply {
        Reply::ConfirmJoin => "CONFIRMJOIN".to_owned(),
        Reply::ClientAlreadyConnected => "CLIENTALREADYCONNECTED".to_owned(),
        Reply::ConfirmCreateFile => "CONFIRMCREATEFILE".to_owned(),
        Reply::FileAlreadyExists => "FILEALREADYEXISTS".to_owned(),
        Reply::ConfirmDeleteFile => "CONFIRMDELETEFILE".to_owned(),
        Reply::FileNotFound => "FILENOTFOUND".to_owned(),
        Reply::Records(records) => {
            let lines: Vec<String> = records
                .iter()
                .map(|r| format!("FILE {} {} {}", r.filename, r.peer, r.size))
                .collect();
            lines.join("\n")
        }
        Reply::NoFiles => "NOFILES".to_owned(),
        Reply::ConfirmLeave => "CONFIRMLEAVE".to_owned(),
        Reply::ClientNotFound => "CLIENTNOTFOUND".to_owned(),
        Reply::UnknownCommand => "UNKNOWNCOMMAND".to_owned(),
        Reply::InvalidCommand => "INVALIDCOMMAND".to_owned(),
    }
}

/// Decode a reply block received from the tracker.
pub fn parse_reply(text: &str) -> Result<Reply, ReplyParseError> {
    let text = text.trim();
    match text {
        "CONFIRMJOIN" => return Ok(Reply::ConfirmJoin),
        "CLIENTALREADYCONNECTED" => return Ok(Reply::ClientAlreadyConnected),
        "CONFIRMCREATEFILE" => return Ok(Reply::ConfirmCreateFile),
        "FILEALREADYEXISTS" => return Ok(Reply::FileAlreadyExists),
        "CONFIRMDELETEFILE" => return Ok(Reply::ConfirmDeleteFile),
        "FILENOTFOUND" => return Ok(Reply::FileNotFound),
        "NOFILES" => return Ok(Reply::NoFiles),
        "CONFIRMLEAVE" => return Ok(Reply::ConfirmLeave),
        "CLIENTNOTFOUND" => return Ok(Reply::ClientNotFound),
        "UNKNOWNCOMMAND" => return Ok(Reply::UnknownCommand),
        "INVALIDCOMMAND" => return Ok(Reply::InvalidCommand),
        _ => {}
    }
    if text.is_empty() {
        return Err(ReplyParseError::Empty);
    }
    let mut records = Vec::new();
    for line in text.lines() {
        records.push(parse_record_line(line.trim())?);
    }
    Ok(Reply::Records(records))
}

fn parse_record_line(line: &str) -> Result<FileRecord, ReplyParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        ["FILE", filename, peer, size] => {
            let peer: IpAddr = peer
                .parse()
                .map_err(|_| ReplyParseError::Malformed(line.to_owned()))?;
            let size: u64 = size
                .parse()
                .map_err(|_| ReplyParseError::Malformed(line.to_owned()))?;
            Ok(FileRecord {
                filename: (*filename).to_owned(),
                peer,
                size,
            })
        }
        _ => Err(ReplyParseError::Malformed(line.to_owned())),
    }
}

/// Error decoding a tracker reply on the client side.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReplyParseError {
    #[error("empty reply")]
    Empty,
    #[error("malformed reply line: {0}")]
    Malformed(String),
}

/// Decode a transfer request line: `GET <filename> <offset_start> [offset_end]`.
/// An end offset below the start offset is malformed; an end past end-of-file is
/// the server's concern (it clamps).
pub fn parse_transfer_request(line: &str) -> Result<TransferRequest, RequestParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        ["GET", filename, start] => {
            let start: u64 = start.parse().map_err(|_| RequestParseError::BadOffset)?;
            Ok(TransferRequest {
                filename: (*filename).to_owned(),
                start,
                end: None,
            })
        }
        ["GET", filename, start, end] => {
            let start: u64 = start.parse().map_err(|_| RequestParseError::BadOffset)?;
            let end: u64 = end.parse().map_err(|_| RequestParseError::BadOffset)?;
            if end < start {
                return Err(RequestParseError::InvertedRange);
            }
            Ok(TransferRequest {
                filename: (*filename).to_owned(),
                start,
                end: Some(end),
            })
        }
        _ => Err(RequestParseError::Malformed),
    }
}

/// Encode a transfer request as its request line, without the trailing newline.
pub fn format_transfer_request(req: &TransferRequest) -> String {
    match req.end {
        Some(end) => format!("GET {} {} {}", req.filename, req.start, end),
        None => format!("GET {} {}", req.filename, req.start),
    }
}

/// Error decoding a transfer request line.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RequestParseError {
    #[error("malformed request line")]
    Malformed,
    #[error("offset is not an integer")]
    BadOffset,
    #[error("end offset below start offset")]
    InvertedRange,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bare_commands() {
        assert_eq!(parse_command("JOIN").unwrap(), Command::Join);
        assert_eq!(parse_command("LISTFILES").unwrap(), Command::ListFiles);
        assert_eq!(parse_command("LEAVE").unwrap(), Command::Leave);
    }

    #[test]
    fn parse_createfile() {
        assert_eq!(
            parse_command("CREATEFILE report.pdf 2048").unwrap(),
            Command::CreateFile {
                filename: "report.pdf".to_owned(),
                size: 2048,
            }
        );
    }

    #[test]
    fn unknown_keyword() {
        assert_eq!(parse_command("HELLO").unwrap_err(), CommandParseError::Unknown);
        // Lowercase is not part of the vocabulary.
        assert_eq!(parse_command("join").unwrap_err(), CommandParseError::Unknown);
    }

    #[test]
    fn wrong_arity_is_bad_args() {
        assert_eq!(parse_command("JOIN now").unwrap_err(), CommandParseError::BadArgs);
        assert_eq!(
            parse_command("CREATEFILE report.pdf").unwrap_err(),
            CommandParseError::BadArgs
        );
        assert_eq!(parse_command("SEARCH a b").unwrap_err(), CommandParseError::BadArgs);
    }

    #[test]
    fn non_integer_size_is_bad_args() {
        assert_eq!(
            parse_command("CREATEFILE report.pdf big").unwrap_err(),
            CommandParseError::BadArgs
        );
        assert_eq!(
            parse_command("CREATEFILE report.pdf -1").unwrap_err(),
            CommandParseError::BadArgs
        );
    }

    #[test]
    fn command_line_roundtrip() {
        let cmds = [
            Command::Join,
            Command::ListFiles,
            Command::CreateFile {
                filename: "a.txt".to_owned(),
                size: 7,
            },
            Command::DeleteFile {
                filename: "a.txt".to_owned(),
            },
            Command::Search {
                filename: "a.txt".to_owned(),
            },
            Command::Leave,
        ];
        for cmd in cmds {
            assert_eq!(parse_command(&format_command(&cmd)).unwrap(), cmd);
        }
    }

    #[test]
    fn records_reply_format() {
        let reply = Reply::Records(vec![
            FileRecord {
                filename: "report.pdf".to_owned(),
                peer: "10.0.0.1".parse().unwrap(),
                size: 2048,
            },
            FileRecord {
                filename: "notes.txt".to_owned(),
                peer: "10.0.0.2".parse().unwrap(),
                size: 16,
            },
        ]);
        let text = format_reply(&reply);
        assert_eq!(text, "FILE report.pdf 10.0.0.1 2048\nFILE notes.txt 10.0.0.2 16");
        assert_eq!(parse_reply(&text).unwrap(), reply);
    }

    #[test]
    fn sentinel_reply_roundtrip() {
        for reply in [
            Reply::ConfirmJoin,
            Reply::ClientAlreadyConnected,
            Reply::FileNotFound,
            Reply::NoFiles,
            Reply::ConfirmLeave,
            Reply::ClientNotFound,
            Reply::UnknownCommand,
            Reply::InvalidCommand,
        ] {
            assert_eq!(parse_reply(&format_reply(&reply)).unwrap(), reply);
        }
    }

    #[test]
    fn garbage_reply_is_malformed() {
        assert!(matches!(parse_reply("FILE too few"), Err(ReplyParseError::Malformed(_))));
        assert_eq!(parse_reply("   ").unwrap_err(), ReplyParseError::Empty);
    }

    #[test]
    fn transfer_request_open_ended() {
        let req = parse_transfer_request("GET report.pdf 10").unwrap();
        assert_eq!(req.filename, "report.pdf");
        assert_eq!(req.start, 10);
        assert_eq!(req.end, None);
    }

    #[test]
    fn transfer_request_bounded() {
        let req = parse_transfer_request("GET report.pdf 10 20").unwrap();
        assert_eq!(req.end, Some(20));
        assert_eq!(
            format_transfer_request(&req),
            "GET report.pdf 10 20"
        );
    }

    #[test]
    fn transfer_request_rejects_bad_offsets() {
        assert_eq!(
            parse_transfer_request("GET f ten").unwrap_err(),
            RequestParseError::BadOffset
        );
        assert_eq!(
            parse_transfer_request("GET f 20 10").unwrap_err(),
            RequestParseError::InvertedRange
        );
        assert_eq!(
            parse_transfer_request("PUT f 0").unwrap_err(),
            RequestParseError::Malformed
        );
        assert_eq!(
            parse_transfer_request("GET f").unwrap_err(),
            RequestParseError::Malformed
        );
    }
}
