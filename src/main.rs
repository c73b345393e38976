use minishell::Interpreter;

fn main() -> anyhow::Result<()> {
    Interpreter::new().repl()
}
