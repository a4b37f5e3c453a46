// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::Utc;

use super::*;

#[test]
fn parses_resolved_browse_entries_only() {
    let output = "\
+;eth0;IPv4;leto.nest-01;_leto._tcp;local\n\
=;eth0;IPv4;leto.nest-01;_leto._tcp;local;nest-01.local.;192.168.0.10;4000;\n\
=;eth0;IPv4;leto.nest-02;_leto._tcp;local;nest-02.local;192.168.0.11;4000;\"\"\n\
=;eth0;IPv4;other-service;_http._tcp;local;web.local;192.168.0.9;80;\n";

    let nodes = parse_avahi_browse(output);
    assert_eq!(nodes.len(), 3);
    assert_eq!(
        nodes.get("nest-01"),
        Some(&Node { name: "nest-01".to_string(), address: "nest-01.local".to_string(), port: 4000 })
    );
    assert_eq!(nodes["nest-02"].address, "nest-02.local");
    // Non-leto instances keep their raw name; callers filter by name
    assert!(nodes.contains_key("other-service"));
}

#[test]
fn skips_unparsable_lines() {
    let nodes = parse_avahi_browse("=;eth0;IPv4;leto.x;_leto._tcp;local;x.local;addr;not-a-port;\ngarbage\n");
    assert!(nodes.is_empty());
}

#[tokio::test]
async fn static_resolver_resolves_known_names() {
    let resolver = StaticResolver::new([Node {
        name: "nest-02".to_string(),
        address: "127.0.0.1".to_string(),
        port: 4321,
    }]);

    let node = resolver.resolve("nest-02").await.unwrap();
    assert_eq!(node.endpoint(), "127.0.0.1:4321");
    assert!(matches!(
        resolver.resolve("nest-99").await,
        Err(ResolveError::UnknownNode(name)) if name == "nest-99"
    ));
}

#[tokio::test]
async fn fresh_cache_short_circuits_browsing() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("node.cache");
    let cache = NodeCache {
        date: Some(Utc::now()),
        nodes: [(
            "nest-01".to_string(),
            Node { name: "nest-01".to_string(), address: "nest-01.local".to_string(), port: 4000 },
        )]
        .into(),
    };
    std::fs::write(&cache_path, serde_yaml::to_string(&cache).unwrap()).unwrap();

    // avahi-browse is not invoked at all when the cache is fresh, so this
    // works on hosts without avahi
    let resolver = AvahiResolver::new().with_cache_path(cache_path);
    let nodes = resolver.list_nodes().await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes["nest-01"].port, 4000);
}
