//! Per-thread description files
//!
//! Every thread gets `{save_root}/{directory_name}/{directory_name}.txt`
//! with one block per post. Re-running a crawl never duplicates a block.

use crate::crawler::{Post, ThreadRecord};
use crate::url::display_thread_url;
use crate::ArchiverError;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Directory holding a thread's description file and attachments
pub fn thread_directory(save_root: &Path, record: &ThreadRecord) -> PathBuf {
    save_root.join(&record.directory_name)
}

/// Location of a thread's description file
pub fn description_path(save_root: &Path, record: &ThreadRecord) -> PathBuf {
    thread_directory(save_root, record).join(format!("{}.txt", record.directory_name))
}

/// Formats one post as a description block
///
/// # Examples
///
/// ```
/// use forum_archiver::crawler::{Post, ThreadRecord};
/// use forum_archiver::output::format_post_block;
///
/// let record = ThreadRecord {
///     url: "https://forum.example.com/threads/me7.5/".to_string(),
///     title: "ME7".to_string(),
///     directory_name: "ME7".to_string(),
///     posts: vec![],
/// };
/// let post = Post { author: "ivan".to_string(), text: " stock dump \n".to_string() };
///
/// assert_eq!(
///     format_post_block(&record, &post),
///     "Thread URL: https://forum.example.com/threads/me7.5\nTitle: ME7\nAuthor: ivan\nDescription:\nstock dump\n"
/// );
/// ```
pub fn format_post_block(record: &ThreadRecord, post: &Post) -> String {
    format!(
        "Thread URL: {}\nTitle: {}\nAuthor: {}\nDescription:\n{}\n",
        display_thread_url(&record.url),
        record.title,
        post.author,
        post.text.trim()
    )
}

/// Appends the thread's post blocks to its description file
///
/// Blocks whose exact text already occurs in the file are skipped. Blocks
/// are separated by one blank line. Returns the number of blocks appended.
pub fn write_description(save_root: &Path, record: &ThreadRecord) -> Result<usize, ArchiverError> {
    let directory = thread_directory(save_root, record);
    std::fs::create_dir_all(&directory).map_err(|e| ArchiverError::filesystem(&directory, e))?;

    let path = description_path(save_root, record);
    let mut content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => return Err(ArchiverError::filesystem(&path, e)),
    };

    let mut addition = String::new();
    let mut appended = 0;
    for post in &record.posts {
        let block = format_post_block(record, post);
        if content.contains(&block) {
            continue;
        }

        let separated = if content.is_empty() {
            block
        } else {
            format!("\n{}", block)
        };
        content.push_str(&separated);
        addition.push_str(&separated);
        appended += 1;
    }

    if appended == 0 {
        tracing::debug!("Description {} already up to date", path.display());
        return Ok(0);
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| ArchiverError::filesystem(&path, e))?;
    file.write_all(addition.as_bytes())
        .map_err(|e| ArchiverError::filesystem(&path, e))?;

    Ok(appended)
}
