//! Repository URL parsing
//!
//! Derives a project's name and "<workspace>/<repository>" full name from
//! its clone URL. One variant per supported hosting service, selected by the
//! host marker in the URL. The full name must match what the same hosting
//! service later reports in webhook payloads.

/// Supported source-control hosting services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoHost {
    Bitbucket,
    GitHub,
    GitLab,
}

impl RepoHost {
    const ALL: [RepoHost; 3] = [RepoHost::Bitbucket, RepoHost::GitHub, RepoHost::GitLab];

    /// Host marker this service uses in clone URLs
    pub fn marker(&self) -> &'static str {
        match self {
            RepoHost::Bitbucket => "bitbucket.org",
            RepoHost::GitHub => "github.com",
            RepoHost::GitLab => "gitlab.com",
        }
    }

    /// Detect the hosting service from a clone URL
    pub fn detect(git_url: &str) -> Option<RepoHost> {
        find_marker(git_url).map(|(host, _)| host)
    }
}

/// Locate the first known host marker in a clone URL
fn find_marker(git_url: &str) -> Option<(RepoHost, usize)> {
    RepoHost::ALL
        .into_iter()
        .find_map(|host| git_url.find(host.marker()).map(|idx| (host, idx)))
}

/// Name coordinates derived from a clone URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCoordinates {
    /// Repository name, without the `.git` suffix
    pub name: String,

    /// "<workspace>/<repository>" path on the hosting service
    pub full_name: String,
}

/// Derive repository coordinates from a clone URL.
///
/// Works for both https (`https://bitbucket.org/acme/widget.git`) and ssh
/// (`git@bitbucket.org:acme/widget.git`) forms. When no known hosting
/// marker is present the derivation degrades to the bare repository name
/// rather than failing; such a project can still be registered but will not
/// match webhooks.
pub fn parse_repo_url(git_url: &str) -> RepoCoordinates {
    let name = repo_name(git_url);

    let Some((host, marker_start)) = find_marker(git_url) else {
        return RepoCoordinates {
            full_name: name.clone(),
            name,
        };
    };

    let marker_end = marker_start + host.marker().len();
    let path = git_url[marker_end..].trim_start_matches(['/', ':']);

    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    segments.pop();

    let full_name = if segments.is_empty() {
        name.clone()
    } else {
        format!("{}/{}", segments.join("/"), name)
    };

    RepoCoordinates { name, full_name }
}

fn repo_name(git_url: &str) -> String {
    let last_segment = git_url
        .rsplit('/')
        .next()
        .unwrap_or(git_url);

    last_segment
        .strip_suffix(".git")
        .unwrap_or(last_segment)
        .to_string()
}
