//! Conditional dispatch through capability traits, over a set where each
//! capability holds for a different subset of the element types.

use pretty_assertions::assert_eq;
use varset::{expose_field, field_capability, variant_set};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Tcp {
    port: u16,
    backlog: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Udp {
    port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Unix {
    path: String,
}

trait Accept {
    fn accept(&mut self) -> u32;
}

impl Accept for Tcp {
    fn accept(&mut self) -> u32 {
        self.backlog -= 1;
        self.backlog
    }
}

impl Accept for Unix {
    fn accept(&mut self) -> u32 {
        0
    }
}

trait Describe {
    fn describe(&self, verbose: bool) -> String;
}

impl Describe for Unix {
    fn describe(&self, verbose: bool) -> String {
        if verbose {
            format!("unix socket at {}", self.path)
        } else {
            self.path.clone()
        }
    }
}

field_capability! {
    /// Network listeners have a port; unix sockets do not.
    trait HasPort { port: u16 }
}

expose_field! { HasPort { port: u16 } for Tcp }
expose_field! { HasPort { port: u16 } for Udp }

impl Tcp {
    fn shutdown(self) -> u16 {
        self.port
    }
}

impl Udp {
    fn shutdown(self) -> u16 {
        self.port
    }
}

impl Unix {
    fn shutdown(self) -> u16 {
        0
    }
}

variant_set! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Listener {
        variants: [Tcp, Udp, Unix],
        calls: {
            fn shutdown(self) -> u16;
        },
        maybe_calls: {
            fn accept(&mut self) -> u32 via Accept;
            fn describe(&self, verbose: bool) -> String via Describe;
        },
        maybe_fields: { port: u16 via HasPort },
    }
}

#[test]
fn capability_subsets_are_independent() {
    let mut tcp = Listener::new(Tcp {
        port: 80,
        backlog: 3,
    });
    let mut udp = Listener::new(Udp { port: 53 });
    let mut unix = Listener::new(Unix {
        path: "/run/app.sock".to_owned(),
    });

    // Accept holds for Tcp and Unix.
    assert_eq!(tcp.accept(), Some(2));
    assert_eq!(udp.accept(), None);
    assert_eq!(unix.accept(), Some(0));

    // Describe holds only for Unix.
    assert_eq!(tcp.describe(true), None);
    assert_eq!(
        unix.describe(true),
        Some("unix socket at /run/app.sock".to_owned())
    );
    assert_eq!(unix.describe(false), Some("/run/app.sock".to_owned()));
}

#[test]
fn conditional_field_covers_the_port_bearing_subset() {
    let tcp = Listener::new(Tcp {
        port: 80,
        backlog: 3,
    });
    let mut udp = Listener::new(Udp { port: 53 });
    let unix = Listener::new(Unix {
        path: "/run/app.sock".to_owned(),
    });

    assert_eq!(tcp.port(), Some(80));
    assert_eq!(udp.port(), Some(53));
    assert_eq!(unix.port(), None);
    assert_eq!(unix.port_ref(), None);

    if let Some(port) = udp.port_mut() {
        *port = 5353;
    }
    assert_eq!(udp.port(), Some(5353));
}

#[test]
fn owned_receiver_consumes_the_handle() {
    let tcp = Listener::new(Tcp {
        port: 80,
        backlog: 3,
    });
    assert_eq!(tcp.shutdown(), 80);

    let unix = Listener::new(Unix {
        path: "/run/app.sock".to_owned(),
    });
    assert_eq!(unix.shutdown(), 0);
}

#[test]
fn repeated_conditional_calls_keep_working() {
    let mut tcp = Listener::new(Tcp {
        port: 80,
        backlog: 3,
    });
    assert_eq!(tcp.accept(), Some(2));
    assert_eq!(tcp.accept(), Some(1));
    assert_eq!(tcp.accept(), Some(0));
}
