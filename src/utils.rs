use url::Url;

/// slash quoting for digest strings
pub trait QuoteForDigest {
    fn quote_for_digest(&self) -> String;
}

impl<T: AsRef<str> + ?Sized> QuoteForDigest for T {
    fn quote_for_digest(&self) -> String {
        self.as_ref().replace('\\', "\\\\").replace('"', "\\\"")
    }
}

/// The digest-uri of a request: path component only, query string excluded.
pub fn digest_uri(url: &Url) -> &str {
    match url.path() {
        "" => "/",
        path => path,
    }
}
