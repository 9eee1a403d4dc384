use bstr::{BString, ByteSlice};
use git_hash::ObjectId;

use crate::ObjectError;

/// A parsed commit.
///
/// Signatures are kept as raw header values; the patch builder only needs
/// the tree and parents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
    pub author: BString,
    pub committer: BString,
    pub message: BString,
}

impl Commit {
    pub fn parse(data: &[u8]) -> Result<Self, ObjectError> {
        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;

        let (headers, message) = match data.find(b"\n\n") {
            Some(pos) => (&data[..pos], &data[pos + 2..]),
            None => (data, &b""[..]),
        };

        for line in headers.lines() {
            // Continuation lines of multi-line headers (gpgsig).
            if line.starts_with(b" ") {
                continue;
            }
            let Some((key, value)) = line.split_once_str(b" ") else {
                continue;
            };
            match key {
                b"tree" => tree = Some(parse_oid(value)?),
                b"parent" => parents.push(parse_oid(value)?),
                b"author" => author = Some(BString::from(value)),
                b"committer" => committer = Some(BString::from(value)),
                _ => {}
            }
        }

        Ok(Self {
            tree: tree.ok_or(ObjectError::MissingCommitField { field: "tree" })?,
            parents,
            author: author.ok_or(ObjectError::MissingCommitField { field: "author" })?,
            committer: committer.ok_or(ObjectError::MissingCommitField { field: "committer" })?,
            message: BString::from(message),
        })
    }

    pub fn serialize_content(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(format!("tree {}\n", self.tree).as_bytes());
        for parent in &self.parents {
            out.extend_from_slice(format!("parent {parent}\n").as_bytes());
        }
        out.extend_from_slice(b"author ");
        out.extend_from_slice(&self.author);
        out.extend_from_slice(b"\ncommitter ");
        out.extend_from_slice(&self.committer);
        out.extend_from_slice(b"\n\n");
        out.extend_from_slice(&self.message);
        out
    }
}

fn parse_oid(value: &[u8]) -> Result<ObjectId, ObjectError> {
    let hex = value.to_str().map_err(|_| ObjectError::InvalidHeader("non-ASCII object id".into()))?;
    Ok(ObjectId::from_hex(hex.trim())?)
}
