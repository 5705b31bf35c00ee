//! Deterministic, rule-based explanation generator used whenever the live
//! backend is unavailable, slow, or erroring. Same `(code, mode)` always
//! yields the same text: no randomness, no clock reads.

use crate::modes::Mode;

/// One detection rule: a predicate over the code body plus the observation
/// strings and per-mode advice it contributes. Rules are evaluated in
/// order; the first match wins.
struct Rule {
    matches: fn(&str) -> bool,
    observations: &'static [&'static str],
    advice: ModeAdvice,
}

struct ModeAdvice {
    friend: &'static str,
    professor: &'static str,
    babysitter: &'static str,
    review: &'static str,
}

impl ModeAdvice {
    fn for_mode(&self, mode: Mode) -> &'static str {
        match mode {
            Mode::Friend => self.friend,
            Mode::Professor => self.professor,
            Mode::Babysitter => self.babysitter,
            Mode::Review => self.review,
        }
    }
}

static RULES: &[Rule] = &[
    Rule {
        matches: |code| code.to_lowercase().contains("fibonacci"),
        observations: &[
            "Implements the Fibonacci sequence",
            "Uses the recursive formula F(n) = F(n-1) + F(n-2), recomputing the same subproblems over and over",
            "Naive recursion costs O(2^n) time, so runtime explodes for larger inputs",
        ],
        advice: ModeAdvice {
            friend: "Pro tip: memoization or a simple loop keeps this fast even for big numbers. The recursive version is lovely for learning though!",
            professor: "Complexity: O(2^n) time and O(n) stack depth. A dynamic-programming or iterative rewrite reduces this to O(n) time and O(1) space.",
            babysitter: "Each Fibonacci number is made by adding the two numbers before it: 0, 1, 1, 2, 3, 5, 8... The function calls itself to work this out, and that trick is called recursion!",
            review: "Naive recursive Fibonacci will fall over on real input sizes. Memoize it or go iterative before this ships.",
        },
    },
    Rule {
        matches: |code| {
            let lower = code.to_lowercase();
            lower.contains("def hello") || lower.contains("hello world") || lower.contains("hello, world")
        },
        observations: &[
            "A small greeting routine",
            "Writes its output directly to the console",
        ],
        advice: ModeAdvice {
            friend: "Simple and readable. A nice building block to grow from!",
            professor: "A minimal procedure demonstrating definition and invocation; no state, no branching, no error paths.",
            babysitter: "This code says hello! Printing a little message is the classic first step every programmer takes.",
            review: "Fine as a starting point. Rename the function after what it actually does once it grows beyond a greeting.",
        },
    },
    Rule {
        matches: |code| code.contains("app.run") && code.to_lowercase().contains("flask"),
        observations: &[
            "Web application bootstrap code",
            "Starts an HTTP server with host and port configuration",
        ],
        advice: ModeAdvice {
            friend: "Standard server startup. The fun part is in the route handlers this wires up!",
            professor: "Server initialization wiring; the substantive behavior resides in the registered route handlers, not here.",
            babysitter: "This code switches on a little web server, like opening the doors of a shop so visitors can come in!",
            review: "Make sure debug mode is off before this gets anywhere near production.",
        },
    },
    Rule {
        matches: |code| {
            let lower = code.to_lowercase();
            lower.contains("<!doctype") || lower.contains("<html")
        },
        observations: &[
            "An HTML document skeleton",
            "Declares the document type and head metadata up front",
        ],
        advice: ModeAdvice {
            friend: "Solid foundation for a web page. Everything visible gets built on top of this!",
            professor: "Standards-conformant document structure; the head section governs encoding, viewport behavior and external resources.",
            babysitter: "This is like the foundation of a house, but for a website! The top part tells the browser what kind of page it is.",
            review: "Boilerplate is in order. Audit the external resources you pull in from the head before adding more.",
        },
    },
    Rule {
        matches: |code| code.contains("import") && code.contains("requests"),
        observations: &[
            "A script that exercises an HTTP API",
            "Sends requests to a service and inspects the responses",
        ],
        advice: ModeAdvice {
            friend: "Handy way to poke at an API. Great for checking a service end to end!",
            professor: "An integration-level probe; it validates observable behavior rather than internal structure.",
            babysitter: "This code knocks on another program's door and checks what answer comes back!",
            review: "Ad-hoc scripts rot quickly. Fold these checks into the test suite so they run on every change.",
        },
    },
    Rule {
        matches: |code| code.contains("print(") || code.contains("console.log"),
        observations: &["Produces output with print statements"],
        advice: ModeAdvice {
            friend: "Printing results is a great way to see what your code is doing!",
            professor: "Console output as the sole observable effect; suitable for demonstration, less so for composition.",
            babysitter: "The print parts make words appear on the screen so you can see what the computer did!",
            review: "Console output is fine for scratch work. Use a logger once anyone else has to run this.",
        },
    },
];

/// Produce a mode-flavored explanation for the code body. Total: always
/// returns non-empty text.
pub fn synthesize(code: &str, mode: Mode) -> String {
    let language = detect_language(code);
    let header = header_for(mode, language);
    let footer = footer_for(mode);

    let body = match RULES.iter().find(|rule| (rule.matches)(code)) {
        Some(rule) => {
            let observations = rule
                .observations
                .iter()
                .map(|observation| format!("- {observation}"))
                .collect::<Vec<_>>()
                .join("\n");
            format!("{observations}\n\n{}", rule.advice.for_mode(mode))
        }
        None => {
            let line_count = code.trim().lines().count().max(1);
            format!(
                "This is {language} code spanning {line_count} line(s). Nothing here matches a \
                 pattern I recognize, but the structure reads as ordinary {language} source."
            )
        }
    };

    format!("{header}\n\n{body}\n\n{footer}")
}

/// Language guess from surface syntax keywords, checked in a fixed order.
pub fn detect_language(code: &str) -> &'static str {
    let lower = code.to_lowercase();
    if lower.contains("<!doctype") || lower.contains("<html") {
        "HTML"
    } else if code.contains("def ") || code.contains("import ") {
        "Python"
    } else if code.contains("function") || code.contains("const ") || code.contains("let ") {
        "JavaScript"
    } else if code.contains("#include") || code.contains("int main") {
        "C/C++"
    } else if code.contains("class ") && code.contains('{') {
        "Java/C#"
    } else {
        "programming"
    }
}

fn header_for(mode: Mode, language: &str) -> String {
    match mode {
        Mode::Friend => format!(
            "Hey! Let me break this down for you!\n\nI can see you have some {language} code here."
        ),
        Mode::Professor => format!("Academic analysis of {language} code:"),
        Mode::Babysitter => format!("Oh, what wonderful {language} code you have here!"),
        Mode::Review => format!("Alright, let me tell you what I see in this {language} code..."),
    }
}

fn footer_for(mode: Mode) -> &'static str {
    match mode {
        Mode::Friend => "Hope this helps! Keep coding!",
        Mode::Professor => {
            "Full model analysis was unavailable; the notes above come from static inspection."
        }
        Mode::Babysitter => "You're doing a great job learning to code!",
        Mode::Review => "Fix the backend and come back for a full review.",
    }
}
