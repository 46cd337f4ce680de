//! Host services the VM exposes to scripts
//!
//! Print output is routed through hooks owned by the [`VmHost`] value given
//! to [`BsVm::new`](crate::vm::BsVm::new). Without a hook the text goes to
//! the log under the `INFO` tag.

use crate::log::LogTag;
use std::fmt;
use std::sync::Arc;

pub type PrintStringFn = Arc<dyn Fn(&str) + Send + Sync>;
pub type PrintIntFn = Arc<dyn Fn(i32) + Send + Sync>;
pub type PrintFloatFn = Arc<dyn Fn(f32) + Send + Sync>;

#[derive(Clone, Default)]
pub struct VmHost {
    print_string: Option<PrintStringFn>,
    print_int: Option<PrintIntFn>,
    print_float: Option<PrintFloatFn>,
}

impl VmHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_print_string(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.print_string = Some(Arc::new(hook));
        self
    }

    pub fn with_print_int(mut self, hook: impl Fn(i32) + Send + Sync + 'static) -> Self {
        self.print_int = Some(Arc::new(hook));
        self
    }

    pub fn with_print_float(mut self, hook: impl Fn(f32) + Send + Sync + 'static) -> Self {
        self.print_float = Some(Arc::new(hook));
        self
    }

    pub fn print_string(&self, value: &str) {
        match &self.print_string {
            Some(hook) => hook(value),
            None => tracing::info!(tag = %LogTag::Info, "{}", value),
        }
    }

    pub fn print_int(&self, value: i32) {
        match &self.print_int {
            Some(hook) => hook(value),
            None => tracing::info!(tag = %LogTag::Info, "{}", value),
        }
    }

    pub fn print_float(&self, value: f32) {
        match &self.print_float {
            Some(hook) => hook(value),
            None => tracing::info!(tag = %LogTag::Info, "{}", value),
        }
    }
}

impl fmt::Debug for VmHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VmHost")
            .field("print_string", &self.print_string.is_some())
            .field("print_int", &self.print_int.is_some())
            .field("print_float", &self.print_float.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_hooks_receive_output() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let (a, b, c) = (lines.clone(), lines.clone(), lines.clone());
        let host = VmHost::new()
            .with_print_string(move |s| a.lock().unwrap().push(s.to_string()))
            .with_print_int(move |i| b.lock().unwrap().push(i.to_string()))
            .with_print_float(move |v| c.lock().unwrap().push(format!("{:.1}", v)));

        host.print_string("hi");
        host.print_int(-3);
        host.print_float(0.5);

        assert_eq!(*lines.lock().unwrap(), vec!["hi", "-3", "0.5"]);
    }

    #[test]
    fn test_missing_hooks_do_not_panic() {
        let host = VmHost::new();
        host.print_string("logged");
        host.print_int(1);
        assert!(format!("{:?}", host).contains("print_int: false"));
    }
}
