//! Hosted git repository URLs (GitHub, GitLab, Bitbucket)
//!
//! Recognizes the URL shapes found in `repository` fields and renders them
//! back in a canonical form. Also hosts the trailing-slash repair applied to
//! every repository URL after canonicalization, since URLs such as
//! `https://github.com/user/project/` defeat host detection downstream.

use url::Url;

/// Known git hosting services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitHost {
    GitHub,
    GitLab,
    Bitbucket,
}

impl GitHost {
    pub fn domain(self) -> &'static str {
        match self {
            GitHost::GitHub => "github.com",
            GitHost::GitLab => "gitlab.com",
            GitHost::Bitbucket => "bitbucket.org",
        }
    }

    fn from_domain(domain: &str) -> Option<Self> {
        let domain = domain.trim_start_matches("www.").to_ascii_lowercase();
        match domain.as_str() {
            "github.com" => Some(GitHost::GitHub),
            "gitlab.com" => Some(GitHost::GitLab),
            "bitbucket.org" => Some(GitHost::Bitbucket),
            _ => None,
        }
    }

    fn from_shortcut(prefix: &str) -> Option<Self> {
        match prefix {
            "github" => Some(GitHost::GitHub),
            "gitlab" => Some(GitHost::GitLab),
            "bitbucket" => Some(GitHost::Bitbucket),
            _ => None,
        }
    }
}

/// The shape a hosted URL was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// `user/project` or `github:user/project`
    Shortcut,
    /// `https://github.com/user/project(.git)`, `git+https://…`
    Https,
    /// `git://github.com/user/project.git`
    Git,
    /// `git@github.com:user/project.git`
    Ssh,
    /// `git+ssh://git@github.com/user/project.git`
    SshUrl,
}

/// A repository on a known git host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedGitInfo {
    pub host: GitHost,
    pub user: String,
    pub project: String,
    pub committish: Option<String>,
    pub representation: Representation,
}

impl HostedGitInfo {
    /// Parse a repository URL, returning `None` for anything not on a known host
    pub fn from_url(url: &str) -> Option<Self> {
        let url = url.trim();
        let (base, committish) = match url.split_once('#') {
            Some((base, c)) if !c.is_empty() => (base, Some(c.to_string())),
            Some((base, _)) => (base, None),
            None => (url, None),
        };

        if let Some(rest) = base.strip_prefix("git@") {
            let (domain, path) = rest.split_once(':')?;
            let host = GitHost::from_domain(domain)?;
            return Self::from_path(host, path, committish, Representation::Ssh);
        }

        if base.contains("://") {
            let parsed = Url::parse(base).ok()?;
            let representation = match parsed.scheme() {
                "https" | "http" | "git+https" | "git+http" => Representation::Https,
                "git" => Representation::Git,
                "ssh" | "git+ssh" => Representation::SshUrl,
                _ => return None,
            };
            let host = GitHost::from_domain(parsed.host_str()?)?;
            return Self::from_path(host, parsed.path(), committish, representation);
        }

        if let Some((prefix, path)) = base.split_once(':') {
            let host = GitHost::from_shortcut(prefix)?;
            return Self::from_path(host, path, committish, Representation::Shortcut);
        }

        // Bare `user/project` is a GitHub shortcut
        if base.starts_with('.') || base.contains('@') || base.chars().any(char::is_whitespace) {
            return None;
        }
        let (user, project) = base.split_once('/')?;
        if project.contains('/') {
            return None;
        }
        Self::from_parts(GitHost::GitHub, user, project, committish, Representation::Shortcut)
    }

    fn from_path(
        host: GitHost,
        path: &str,
        committish: Option<String>,
        representation: Representation,
    ) -> Option<Self> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let user = segments.next()?;
        let project = segments.next()?;
        // Deeper paths (`/tree/master`, `/issues`) are browse URLs, not repositories
        if segments.next().is_some() {
            return None;
        }
        Self::from_parts(host, user, project, committish, representation)
    }

    fn from_parts(
        host: GitHost,
        user: &str,
        project: &str,
        committish: Option<String>,
        representation: Representation,
    ) -> Option<Self> {
        let project = project.strip_suffix(".git").unwrap_or(project);
        if user.is_empty() || project.is_empty() {
            return None;
        }

        Some(Self {
            host,
            user: user.to_string(),
            project: project.to_string(),
            committish,
            representation,
        })
    }

    /// `git+https://<host>/<user>/<project>.git`
    pub fn https_url(&self) -> String {
        self.with_committish(format!(
            "git+https://{}/{}/{}.git",
            self.host.domain(),
            self.user,
            self.project
        ))
    }

    /// Render in the representation the URL was written in (shortcuts expand to https)
    pub fn to_url(&self) -> String {
        let domain = self.host.domain();
        match self.representation {
            Representation::Shortcut | Representation::Https => self.https_url(),
            Representation::Git => self.with_committish(format!(
                "git://{}/{}/{}.git",
                domain, self.user, self.project
            )),
            Representation::Ssh => self.with_committish(format!(
                "git@{}:{}/{}.git",
                domain, self.user, self.project
            )),
            Representation::SshUrl => self.with_committish(format!(
                "git+ssh://git@{}/{}/{}.git",
                domain, self.user, self.project
            )),
        }
    }

    pub fn bugs_url(&self) -> String {
        format!("https://{}/{}/{}/issues", self.host.domain(), self.user, self.project)
    }

    /// Project landing page, used as the default homepage
    pub fn docs_url(&self) -> String {
        format!("https://{}/{}/{}#readme", self.host.domain(), self.user, self.project)
    }

    fn with_committish(&self, url: String) -> String {
        match &self.committish {
            Some(c) => format!("{}#{}", url, c),
            None => url,
        }
    }
}

/// Strip trailing slashes from a repository URL
///
/// `https://host/user/project/` becomes `https://host/user/project` and
/// `https://host/user/project/.git` becomes `https://host/user/project.git`.
/// For known hosts, empty path segments are collapsed as well. The `scheme://`
/// separator and any `#committish` suffix are left untouched.
pub fn normalize_trailing_slashes(url: &str) -> String {
    let (base, fragment) = match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (url, None),
    };

    let floor = base.find("://").map(|i| i + 3).unwrap_or(0);
    let mut out = base.to_string();

    loop {
        let before = out.len();
        while out.len() > floor && out.ends_with('/') {
            out.pop();
        }
        if out.len() > floor + "/.git".len() && out.ends_with("/.git") {
            out.truncate(out.len() - "/.git".len());
            out.push_str(".git");
        }
        if out.len() == before {
            break;
        }
    }

    if floor > 0 {
        out = collapse_known_host_path(&out, floor);
    }

    match fragment {
        Some(fragment) => format!("{}#{}", out, fragment),
        None => out,
    }
}

fn collapse_known_host_path(url: &str, floor: usize) -> String {
    let (prefix, rest) = url.split_at(floor);
    let Some((authority, path)) = rest.split_once('/') else {
        return url.to_string();
    };

    let domain = authority.rsplit('@').next().unwrap_or(authority);
    let domain = domain.split(':').next().unwrap_or(domain);
    if GitHost::from_domain(domain).is_none() {
        return url.to_string();
    }

    let path = path
        .split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    format!("{}{}/{}", prefix, authority, path)
}
