//! Served HTML pages.
//!
//! The front-end is three static pages with inline styles and vanilla JS,
//! templated only by the auth server's base URL. The chat page talks to
//! the API server for queries and uploads and to the auth server for
//! session verification, transcript loading, and logout.

/// Landing page of the auth server: the sign-in button.
pub const LOGIN_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>QueryBridge Login</title>
    <style>
        body {
            font-family: Arial, sans-serif;
            display: flex;
            align-items: center;
            justify-content: center;
            height: 100vh;
            margin: 0;
            background-color: #f5f5f5;
        }
        .container {
            text-align: center;
            padding: 2rem;
            background: white;
            border-radius: 8px;
            box-shadow: 0 2px 4px rgba(0,0,0,0.1);
        }
        .google-btn {
            background: #4285f4;
            color: white;
            padding: 12px 24px;
            border: none;
            border-radius: 4px;
            font-size: 16px;
            cursor: pointer;
            text-decoration: none;
            display: inline-block;
        }
        .google-btn:hover {
            background: #357abd;
        }
    </style>
</head>
<body>
    <div class="container">
        <h1>Welcome to QueryBridge</h1>
        <a href="/login" class="google-btn">Sign in with Google</a>
    </div>
</body>
</html>
"#;

/// Landing page of the API server: points at the chat page and sign-in.
const HOME_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>QueryBridge</title>
    <style>
        body {
            font-family: Arial, sans-serif;
            display: flex;
            align-items: center;
            justify-content: center;
            height: 100vh;
            margin: 0;
            background-color: #f5f5f5;
        }
        .container {
            text-align: center;
            padding: 2rem;
            background: white;
            border-radius: 8px;
            box-shadow: 0 2px 4px rgba(0,0,0,0.1);
        }
        a { color: #4285f4; }
    </style>
</head>
<body>
    <div class="container">
        <h1>QueryBridge</h1>
        <p>Chat with your PDFs.</p>
        <p><a href="{{AUTH_BASE}}">Sign in</a> to get started, or open the <a href="/chat">chat</a> if you already have a session link.</p>
    </div>
</body>
</html>
"#;

/// The chat page. Reads `email` and `session` from the query string,
/// verifies them against the auth server, then drives `/query` and
/// `/batch-ingest` on this server.
const CHAT_PAGE: &str = r##"<!DOCTYPE html>
<html>
<head>
    <title>QueryBridge</title>
    <style>
        body {
            font-family: Arial, sans-serif;
            margin: 0;
            background-color: #f5f5f5;
            height: 100vh;
        }
        #app { display: flex; height: 100vh; }
        #sidebar {
            width: 260px;
            padding: 1rem;
            background: white;
            border-right: 1px solid #ddd;
            display: flex;
            flex-direction: column;
            gap: 0.75rem;
        }
        #main {
            flex: 1;
            display: flex;
            flex-direction: column;
            padding: 1rem 2rem;
        }
        #messages {
            flex: 1;
            overflow-y: auto;
            padding: 0.5rem 0;
        }
        .msg {
            max-width: 70%;
            margin: 0.4rem 0;
            padding: 0.6rem 0.9rem;
            border-radius: 8px;
            white-space: pre-wrap;
        }
        .msg.user { background: #4285f4; color: white; margin-left: auto; }
        .msg.assistant { background: white; border: 1px solid #ddd; }
        #chat-form { display: flex; gap: 0.5rem; }
        #chat-input {
            flex: 1;
            padding: 0.6rem;
            border: 1px solid #ccc;
            border-radius: 4px;
        }
        button {
            background: #4285f4;
            color: white;
            padding: 0.6rem 1rem;
            border: none;
            border-radius: 4px;
            cursor: pointer;
        }
        button:hover { background: #357abd; }
        .logout-btn {
            color: #666;
            text-decoration: none;
            font-size: 14px;
        }
        #upload-status { font-size: 13px; color: #444; white-space: pre-wrap; }
        .login-prompt {
            margin: auto;
            padding: 2rem;
            background: white;
            border-radius: 8px;
            box-shadow: 0 2px 4px rgba(0,0,0,0.1);
        }
    </style>
</head>
<body>
    <div id="app">
        <div id="sidebar">
            <div id="user-email"></div>
            <a id="logout-link" class="logout-btn" href="#">Logout</a>
            <hr style="width:100%">
            <h3 style="margin:0">Upload PDFs</h3>
            <input type="file" id="file-input" multiple accept=".pdf,.txt,.md">
            <button id="upload-btn" type="button">Process Documents</button>
            <div id="upload-status"></div>
        </div>
        <div id="main">
            <h2>Chat with your documents</h2>
            <div id="messages"></div>
            <form id="chat-form">
                <input type="text" id="chat-input" placeholder="Ask a question about your documents" autocomplete="off">
                <button type="submit">Send</button>
            </form>
        </div>
    </div>
    <script>
    const AUTH_BASE = "{{AUTH_BASE}}";
    const params = new URLSearchParams(window.location.search);
    const email = params.get("email");
    const sessionId = params.get("session");

    function addMessage(role, content) {
        const div = document.createElement("div");
        div.className = "msg " + role;
        div.textContent = content;
        const box = document.getElementById("messages");
        box.appendChild(div);
        box.scrollTop = box.scrollHeight;
    }

    function showLoginPrompt() {
        document.getElementById("app").innerHTML =
            '<div class="login-prompt">Please log in to continue. <a href="' +
            AUTH_BASE + '">Sign in</a></div>';
    }

    async function init() {
        if (!email || !sessionId) {
            showLoginPrompt();
            return;
        }
        try {
            const verify = await fetch(
                AUTH_BASE + "/verify-session/" + encodeURIComponent(email) +
                "?session=" + encodeURIComponent(sessionId));
            if (!verify.ok) {
                showLoginPrompt();
                return;
            }
        } catch (e) {
            showLoginPrompt();
            return;
        }

        document.getElementById("user-email").textContent = "Welcome " + email + "!";
        document.getElementById("logout-link").href =
            AUTH_BASE + "/logout?session=" + encodeURIComponent(sessionId);

        // The transcript is nice to have; failing to load it is not fatal.
        try {
            const resp = await fetch(
                AUTH_BASE + "/session?session=" + encodeURIComponent(sessionId));
            if (resp.ok) {
                const record = await resp.json();
                (record.messages || []).forEach(m => addMessage(m.role, m.content));
            }
        } catch (e) {}
    }

    document.getElementById("chat-form").addEventListener("submit", async (ev) => {
        ev.preventDefault();
        const input = document.getElementById("chat-input");
        const query = input.value.trim();
        if (!query) return;
        input.value = "";
        addMessage("user", query);
        try {
            const resp = await fetch("/query", {
                method: "POST",
                headers: { "Content-Type": "application/json" },
                body: JSON.stringify({ query: query, email: email, session: sessionId })
            });
            if (!resp.ok) {
                addMessage("assistant", "Sorry, I couldn't process your question. Please try again.");
                return;
            }
            const data = await resp.json();
            addMessage("assistant", data.answer);
        } catch (e) {
            addMessage("assistant", "Sorry, I couldn't process your question. Please try again.");
        }
    });

    document.getElementById("upload-btn").addEventListener("click", async () => {
        const input = document.getElementById("file-input");
        const status = document.getElementById("upload-status");
        if (!input.files.length) {
            status.textContent = "Choose at least one file.";
            return;
        }
        const form = new FormData();
        form.append("email", email);
        for (const file of input.files) {
            form.append("files", file);
        }
        status.textContent = "Uploading and processing documents...";
        try {
            const resp = await fetch("/batch-ingest", { method: "POST", body: form });
            const data = await resp.json();
            if (!resp.ok) {
                status.textContent = "Error uploading files: " +
                    (data.error ? data.error.message : resp.status);
                return;
            }
            const lines = [];
            for (const name of data.successful_files) {
                lines.push("✓ " + name);
            }
            for (const f of data.failed_files) {
                lines.push("✗ " + f.filename + ": " + f.error);
            }
            lines.push(data.total_chunks + " chunks indexed");
            status.textContent = lines.join("\n");
            input.value = "";
        } catch (e) {
            status.textContent = "Error connecting to server: " + e;
        }
    });

    init();
    </script>
</body>
</html>
"##;

pub fn render_home_page(auth_base: &str) -> String {
    HOME_PAGE.replace("{{AUTH_BASE}}", auth_base)
}

pub fn render_chat_page(auth_base: &str) -> String {
    CHAT_PAGE.replace("{{AUTH_BASE}}", auth_base)
}
