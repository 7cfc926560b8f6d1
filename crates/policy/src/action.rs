//! Docker API request → action name mapping.
//!
//! Policies are written against stable action names (`container_create`,
//! `image_pull`, ...) rather than raw API paths. A request is mapped by
//! stripping the query string and the optional `/vX.Y` version prefix, then
//! matching the remaining path against a fixed route table.

/// Action reported for routes missing from the table.
pub const UNKNOWN_ACTION: &str = "unknown";

/// One entry of the route table.
///
/// Pattern segments: a literal, `*` (exactly one segment) or `**` (one or
/// more segments, only valid as the last or second-to-last segment, used for
/// image names that contain `/`).
struct Route {
    method: &'static str,
    pattern: &'static str,
    action: &'static str,
}

const fn route(method: &'static str, pattern: &'static str, action: &'static str) -> Route {
    Route {
        method,
        pattern,
        action,
    }
}

// Order matters: literal routes must precede wildcard routes sharing a prefix.
const ROUTES: &[Route] = &[
    // Containers
    route("GET", "/containers/json", "container_list"),
    route("POST", "/containers/create", "container_create"),
    route("POST", "/containers/prune", "container_prune"),
    route("GET", "/containers/*/json", "container_inspect"),
    route("GET", "/containers/*/top", "container_top"),
    route("GET", "/containers/*/logs", "container_logs"),
    route("GET", "/containers/*/changes", "container_changes"),
    route("GET", "/containers/*/export", "container_export"),
    route("GET", "/containers/*/stats", "container_stats"),
    route("GET", "/containers/*/archive", "container_archive"),
    route("HEAD", "/containers/*/archive", "container_archive_info"),
    route("PUT", "/containers/*/archive", "container_archive_extract"),
    route("POST", "/containers/*/resize", "container_resize"),
    route("POST", "/containers/*/start", "container_start"),
    route("POST", "/containers/*/stop", "container_stop"),
    route("POST", "/containers/*/restart", "container_restart"),
    route("POST", "/containers/*/kill", "container_kill"),
    route("POST", "/containers/*/update", "container_update"),
    route("POST", "/containers/*/rename", "container_rename"),
    route("POST", "/containers/*/pause", "container_pause"),
    route("POST", "/containers/*/unpause", "container_unpause"),
    route("POST", "/containers/*/attach", "container_attach"),
    route("GET", "/containers/*/attach/ws", "container_attach_ws"),
    route("POST", "/containers/*/wait", "container_wait"),
    route("POST", "/containers/*/exec", "container_exec_create"),
    route("DELETE", "/containers/*", "container_delete"),
    // Exec
    route("POST", "/exec/*/start", "container_exec_start"),
    route("POST", "/exec/*/resize", "container_exec_resize"),
    route("GET", "/exec/*/json", "container_exec_inspect"),
    // Images
    route("GET", "/images/json", "image_list"),
    route("POST", "/images/create", "image_create"),
    route("POST", "/images/load", "image_load"),
    route("GET", "/images/get", "image_save_all"),
    route("GET", "/images/search", "image_search"),
    route("POST", "/images/prune", "image_prune"),
    route("GET", "/images/**/json", "image_inspect"),
    route("GET", "/images/**/history", "image_history"),
    route("GET", "/images/**/get", "image_save"),
    route("POST", "/images/**/push", "image_push"),
    route("POST", "/images/**/tag", "image_tag"),
    route("DELETE", "/images/**", "image_delete"),
    route("POST", "/build", "image_build"),
    route("POST", "/build/prune", "image_build_prune"),
    route("POST", "/commit", "image_commit"),
    // Networks
    route("GET", "/networks", "network_list"),
    route("POST", "/networks/create", "network_create"),
    route("POST", "/networks/prune", "network_prune"),
    route("GET", "/networks/*", "network_inspect"),
    route("POST", "/networks/*/connect", "network_connect"),
    route("POST", "/networks/*/disconnect", "network_disconnect"),
    route("DELETE", "/networks/*", "network_delete"),
    // Volumes
    route("GET", "/volumes", "volume_list"),
    route("POST", "/volumes/create", "volume_create"),
    route("POST", "/volumes/prune", "volume_prune"),
    route("GET", "/volumes/*", "volume_inspect"),
    route("DELETE", "/volumes/*", "volume_delete"),
    // System
    route("POST", "/auth", "docker_auth"),
    route("GET", "/info", "docker_info"),
    route("GET", "/version", "docker_version"),
    route("GET", "/_ping", "docker_ping"),
    route("HEAD", "/_ping", "docker_ping"),
    route("GET", "/events", "docker_events"),
    route("GET", "/system/df", "docker_disk_usage"),
];

/// Strip the query string and an optional `/vX.Y` API version prefix.
///
/// `/v1.41/containers/json?all=1` → `/containers/json`.
pub fn normalize_path(uri: &str) -> &str {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);

    if let Some(rest) = path.strip_prefix("/v") {
        let (version, tail) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };
        let is_version = !version.is_empty()
            && version.chars().all(|c| c.is_ascii_digit() || c == '.')
            && version.chars().next().is_some_and(|c| c.is_ascii_digit());
        if is_version {
            return tail;
        }
    }
    path
}

/// Map a Docker API request to its action name.
pub fn action_for(method: &str, uri: &str) -> &'static str {
    let path = normalize_path(uri);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    ROUTES
        .iter()
        .find(|r| r.method.eq_ignore_ascii_case(method) && pattern_matches(r.pattern, &segments))
        .map(|r| r.action)
        .unwrap_or(UNKNOWN_ACTION)
}

/// Whether an HTTP method only reads state.
pub fn is_read_only(method: &str) -> bool {
    method.eq_ignore_ascii_case("GET") || method.eq_ignore_ascii_case("HEAD")
}

fn pattern_matches(pattern: &str, segments: &[&str]) -> bool {
    let parts: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    match_parts(&parts, segments)
}

fn match_parts(parts: &[&str], segments: &[&str]) -> bool {
    match (parts.split_first(), segments.split_first()) {
        (None, None) => true,
        (None, Some(_)) | (Some(_), None) => false,
        (Some((&"**", rest)), _) => {
            // Greedy from the right: `**` swallows everything the tail does not need.
            if segments.len() < rest.len() + 1 {
                return false;
            }
            let take = segments.len() - rest.len();
            match_parts(rest, &segments[take..])
        }
        (Some((&"*", rest)), Some((_, seg_rest))) => match_parts(rest, seg_rest),
        (Some((lit, rest)), Some((seg, seg_rest))) => lit == seg && match_parts(rest, seg_rest),
    }
}
