/// Format a line to the `output` method of a `Trf7960Log`
#[macro_export]
macro_rules! output {
    ($log: expr, $($args: tt)+) => {
        $log.output(format_args!($($args)+))
    };
}

/// Format a line to the `warning` method of a `Trf7960Log`
#[macro_export]
macro_rules! warning {
    ($log: expr, $($args: tt)+) => {
        $log.warning(format_args!($($args)+))
    };
}

/// Format a line to the `error` method of a `Trf7960Log`
#[macro_export]
macro_rules! error {
    ($log: expr, $($args: tt)+) => {
        $log.error(format_args!($($args)+))
    };
}

/// Format a protocol diagnostic to the `debug` method of a `Trf7960Log`
#[macro_export]
macro_rules! debug {
    ($log: expr, $($args: tt)+) => {
        $log.debug(format_args!($($args)+))
    };
}
