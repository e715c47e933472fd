// Copyright 2026 the wren authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Request execution: URL routing, credential checks, and static file
//! resolution.
//!
//! The character after the last `/` of the URL selects the page: digits
//! `0`, `1`, `5`, `6`, `7` map to fixed pages, while `2` (login) and `3`
//! (register) consume a POST body of the form `user=<name>&password=<pwd>`
//! and redirect to the outcome page. Any other URL is a static asset path
//! under the document root.
//!
//! The resolved file is memory-mapped and the mapping is owned by the
//! connection until the send finishes, so large files are never copied
//! through userspace buffers.

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use config::{HttpdConfig, ServerConfig};
use memmap2::Mmap;

use crate::common::FILE_NAME_SIZE;
use crate::protocol::{empty_file_reply, error_reply, file_reply, Reply, Status};
use crate::session::Exchange;

/// Shared application state handed to every worker.
pub struct Context {
    pub config: Arc<HttpdConfig>,
    pub db: Option<dbpool::DbPool>,
    pub users: Mutex<HashMap<String, String>>,
}

impl Context {
    pub fn new(config: Arc<HttpdConfig>, db: Option<dbpool::DbPool>) -> Self {
        Self {
            config,
            db,
            users: Mutex::new(HashMap::new()),
        }
    }
}

/// Execute a completely parsed request and compose the reply.
pub fn process(exchange: &Exchange, context: &Context) -> Reply {
    let parser = &exchange.parser;
    let url = parser.url(&exchange.buf);
    let linger = parser.linger();

    let result = execute(url, parser.cgi(), parser.body(&exchange.buf), linger, context);
    match result {
        Ok(reply) => {
            debug!("{} -> 200", url);
            reply
        }
        Err(status) => {
            debug!("{} -> {}", url, status.code());
            error_reply(status, linger)
        }
    }
}

fn execute(
    url: &str,
    cgi: bool,
    body: Option<&str>,
    linger: bool,
    context: &Context,
) -> Result<Reply, Status> {
    let discriminator = url
        .rfind('/')
        .and_then(|pos| url.as_bytes().get(pos + 1))
        .copied();

    // login/register rewrite the url to their outcome page
    let mut current = url;
    if cgi && matches!(discriminator, Some(b'2') | Some(b'3')) {
        current = match discriminator {
            Some(b'3') => {
                if try_register(body, context) {
                    "/log.html"
                } else {
                    "/registerError.html"
                }
            }
            _ => {
                if try_login(body, context) {
                    "/welcome.html"
                } else {
                    "/logError.html"
                }
            }
        };
    }

    let page = match discriminator {
        Some(b'0') => "/register.html",
        Some(b'1') => "/log.html",
        Some(b'5') => "/picture.html",
        Some(b'6') => "/video.html",
        Some(b'7') => "/fans.html",
        _ => current,
    };

    serve_file(context, page, linger)
}

/// Split `user=<name>&password=<pwd>` into its two fields.
fn parse_credentials(body: &str) -> Option<(&str, &str)> {
    let rest = body.strip_prefix("user=")?;
    let (name, rest) = rest.split_once('&')?;
    let password = rest.strip_prefix("password=")?;
    Some((name, password))
}

fn try_login(body: Option<&str>, context: &Context) -> bool {
    let Some((name, password)) = body.and_then(parse_credentials) else {
        return false;
    };
    let users = context.users.lock().unwrap();
    users.get(name).map(String::as_str) == Some(password)
}

fn try_register(body: Option<&str>, context: &Context) -> bool {
    let Some((name, password)) = body.and_then(parse_credentials) else {
        return false;
    };
    if context.users.lock().unwrap().contains_key(name) {
        return false;
    }
    let Some(pool) = &context.db else {
        error!("registration attempted without a configured database");
        return false;
    };

    let mut client = pool.lease();
    // the users mutex is the outer lock here; this is the only path that
    // holds it together with a database lease
    let mut users = context.users.lock().unwrap();
    if users.contains_key(name) {
        return false;
    }
    match client.execute(
        "INSERT INTO users (username, password) VALUES ($1, $2)",
        &[&name, &password],
    ) {
        Ok(_) => {
            users.insert(name.to_string(), password.to_string());
            info!("registered user: {}", name);
            true
        }
        Err(e) => {
            error!("registration failed for {}: {}", name, e);
            false
        }
    }
}

fn serve_file(context: &Context, page: &str, linger: bool) -> Result<Reply, Status> {
    let root = context.config.server().document_root();
    if root.len() + page.len() > FILE_NAME_SIZE {
        debug!("resolved path too long: {}{}", root, page);
        return Err(Status::NotFound);
    }
    let mut path = PathBuf::from(root);
    // the url always begins with '/'; join relative to the root
    path.push(&page[1..]);

    let metadata = std::fs::metadata(&path).map_err(|_| Status::NotFound)?;
    if metadata.permissions().mode() & 0o004 == 0 {
        return Err(Status::Forbidden);
    }
    if metadata.is_dir() {
        // historically answered like a missing resource
        return Err(Status::NotFound);
    }

    let file = std::fs::File::open(&path).map_err(|_| Status::InternalError)?;
    if metadata.len() == 0 {
        return Ok(empty_file_reply(linger));
    }
    let mapping = unsafe { Mmap::map(&file) }.map_err(|_| Status::InternalError)?;
    Ok(file_reply(mapping, linger))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scratch_root(tag: &str) -> PathBuf {
        static SEQ: AtomicUsize = AtomicUsize::new(0);
        let dir = std::env::temp_dir().join(format!(
            "wren-processor-{}-{}-{}",
            tag,
            std::process::id(),
            SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn context_with_root(root: &PathBuf) -> Context {
        let toml = format!("[server]\ndocument_root = {:?}\n", root.to_str().unwrap());
        let config: HttpdConfig = toml::from_str(&toml).unwrap();
        Context::new(Arc::new(config), None)
    }

    fn write_page(root: &PathBuf, name: &str, content: &str) {
        let mut f = std::fs::File::create(root.join(name)).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    fn body_of(reply: &Reply) -> String {
        let text = String::from_utf8(reply.head.to_vec()).unwrap();
        let inline = text.split("\r\n\r\n").nth(1).unwrap_or("").to_string();
        match &reply.file {
            Some(mapping) => String::from_utf8_lossy(mapping).into_owned(),
            None => inline,
        }
    }

    #[test]
    fn discriminators_select_pages() {
        let root = scratch_root("pages");
        write_page(&root, "register.html", "reg");
        write_page(&root, "log.html", "log");
        write_page(&root, "picture.html", "pic");
        write_page(&root, "video.html", "vid");
        write_page(&root, "fans.html", "fans");
        let context = context_with_root(&root);

        for (url, content) in [
            ("/0", "reg"),
            ("/1", "log"),
            ("/5", "pic"),
            ("/6", "vid"),
            ("/7", "fans"),
        ] {
            let reply = execute(url, false, None, true, &context).unwrap();
            assert_eq!(body_of(&reply), content, "url {}", url);
        }
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn static_files_and_errors() {
        let root = scratch_root("static");
        write_page(&root, "index.html", "hello");
        write_page(&root, "empty.html", "");
        std::fs::create_dir(root.join("dir")).unwrap();
        let context = context_with_root(&root);

        let reply = execute("/index.html", false, None, true, &context).unwrap();
        assert_eq!(body_of(&reply), "hello");

        let reply = execute("/empty.html", false, None, true, &context).unwrap();
        assert_eq!(body_of(&reply), "<html><body></body></html>");

        assert_eq!(
            execute("/nope.html", false, None, true, &context).unwrap_err(),
            Status::NotFound
        );
        assert_eq!(
            execute("/dir", false, None, true, &context).unwrap_err(),
            Status::NotFound
        );
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn unreadable_file_is_forbidden() {
        let root = scratch_root("forbidden");
        write_page(&root, "secret.html", "s");
        let path = root.join("secret.html");
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o600);
        std::fs::set_permissions(&path, perms).unwrap();
        let context = context_with_root(&root);

        assert_eq!(
            execute("/secret.html", false, None, true, &context).unwrap_err(),
            Status::Forbidden
        );
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn login_against_seeded_users() {
        let root = scratch_root("login");
        write_page(&root, "welcome.html", "welcome");
        write_page(&root, "logError.html", "bad login");
        let context = context_with_root(&root);
        context
            .users
            .lock()
            .unwrap()
            .insert("alice".to_string(), "secret".to_string());

        let reply = execute(
            "/2CGISQL.cgi",
            true,
            Some("user=alice&password=secret"),
            true,
            &context,
        )
        .unwrap();
        assert_eq!(body_of(&reply), "welcome");

        let reply = execute(
            "/2CGISQL.cgi",
            true,
            Some("user=alice&password=bad"),
            true,
            &context,
        )
        .unwrap();
        assert_eq!(body_of(&reply), "bad login");

        // unknown user
        let reply = execute(
            "/2CGISQL.cgi",
            true,
            Some("user=mallory&password=x"),
            true,
            &context,
        )
        .unwrap();
        assert_eq!(body_of(&reply), "bad login");
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn register_without_database_fails() {
        let root = scratch_root("register");
        write_page(&root, "registerError.html", "no");
        let context = context_with_root(&root);

        let reply = execute(
            "/3CGISQL.cgi",
            true,
            Some("user=bob&password=pw"),
            true,
            &context,
        )
        .unwrap();
        assert_eq!(body_of(&reply), "no");
        assert!(context.users.lock().unwrap().is_empty());
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn malformed_credentials_fail_closed() {
        assert_eq!(parse_credentials("user=a&password=b"), Some(("a", "b")));
        assert_eq!(parse_credentials("user=a"), None);
        assert_eq!(parse_credentials("name=a&password=b"), None);
        assert_eq!(parse_credentials("user=a&pass=b"), None);
    }
}
